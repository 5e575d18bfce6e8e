//! External USD rate oracles.

use crate::cadence::Value;
use crate::flow::{FetchError, FlowClient};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("no price product configured for vault {0}")]
    UnknownVault(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unparseable rate {0:?}")]
    Parse(String),
    #[error("failed to read price script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("price script failed: {0}")]
    Flow(#[from] FetchError),
}

/// USD value of one unit of a vault's currency.
#[async_trait]
pub trait RateOracle: Send + Sync {
    async fn usd_rate(&self, vault_type: &str) -> Result<Decimal, OracleError>;
}

#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

/// Coinbase public spot price endpoint.
///
/// Vault types are mapped to product ids (`FLOW-USD`, ...) by configuration.
pub struct CoinbaseOracle {
    base_url: String,
    products: HashMap<String, String>,
    http: Client,
}

impl CoinbaseOracle {
    pub fn new(base_url: impl Into<String>, products: HashMap<String, String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            products,
            http: Client::new(),
        }
    }

    pub fn product_for(&self, vault_type: &str) -> Option<&str> {
        self.products.get(vault_type).map(String::as_str)
    }
}

#[async_trait]
impl RateOracle for CoinbaseOracle {
    async fn usd_rate(&self, vault_type: &str) -> Result<Decimal, OracleError> {
        let product = self
            .product_for(vault_type)
            .ok_or_else(|| OracleError::UnknownVault(vault_type.to_string()))?;

        let url = format!("{}/v2/prices/{}/spot", self.base_url, product);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Http { status, body });
        }

        let spot: SpotResponse = resp.json().await?;
        let rate = parse_rate(&spot.data.amount)?;
        debug!(product = product, rate = %rate, "spot price fetched");
        Ok(rate)
    }
}

/// On-chain price feed read through a Cadence script.
///
/// The script takes the feed contract's address and returns the USD price of
/// one FLOW as a `UFix64`. Only the configured vault types are served.
pub struct ScriptOracle {
    client: FlowClient,
    script: String,
    feed_address: String,
    vault_types: Vec<String>,
}

impl ScriptOracle {
    pub fn new(client: FlowClient, script: String, feed_address: &str, vault_types: Vec<String>) -> Self {
        let feed_address = format!("0x{}", feed_address.trim_start_matches("0x"));
        Self {
            client,
            script,
            feed_address,
            vault_types,
        }
    }

    pub fn load(
        client: FlowClient,
        path: &Path,
        feed_address: &str,
        vault_types: Vec<String>,
    ) -> Result<Self, OracleError> {
        let script = std::fs::read_to_string(path).map_err(|source| OracleError::Script {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(client, script, feed_address, vault_types))
    }
}

#[async_trait]
impl RateOracle for ScriptOracle {
    async fn usd_rate(&self, vault_type: &str) -> Result<Decimal, OracleError> {
        if !self.vault_types.iter().any(|v| v == vault_type) {
            return Err(OracleError::UnknownVault(vault_type.to_string()));
        }
        let args = [json!({ "type": "Address", "value": self.feed_address })];
        let value = self.client.execute_script(&self.script, &args).await?;
        let rate = rate_from_value(&value)?;
        debug!(feed = %self.feed_address, rate = %rate, "on-chain price read");
        Ok(rate)
    }
}

fn rate_from_value(value: &Value) -> Result<Decimal, OracleError> {
    value
        .as_decimal()
        .ok_or_else(|| OracleError::Parse(format!("{value:?}")))
}

fn parse_rate(raw: &str) -> Result<Decimal, OracleError> {
    Decimal::from_str(raw.trim()).map_err(|_| OracleError::Parse(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spot_body() {
        let body = r#"{"data":{"amount":"0.7421","base":"FLOW","currency":"USD"}}"#;
        let spot: SpotResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parse_rate(&spot.data.amount).unwrap(),
            Decimal::from_str("0.7421").unwrap()
        );
        assert!(matches!(parse_rate("abc"), Err(OracleError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unknown_vault_rejected_without_request() {
        let oracle = CoinbaseOracle::new("http://127.0.0.1:9", HashMap::new());
        let err = oracle
            .usd_rate("A.0000000000000000.Mystery.Vault")
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::UnknownVault(_)));
    }

    #[test]
    fn test_script_result_to_rate() {
        let rate = rate_from_value(&Value::Optional(Some(Box::new(Value::Fixed(
            Decimal::from_str("0.41230000").unwrap(),
        )))))
        .unwrap();
        assert_eq!(rate, Decimal::from_str("0.4123").unwrap());
        assert!(matches!(rate_from_value(&Value::Optional(None)), Err(OracleError::Parse(_))));
    }

    #[tokio::test]
    async fn test_script_oracle_serves_only_configured_vaults() {
        let oracle = ScriptOracle::new(
            FlowClient::new("http://127.0.0.1:9"),
            "access(all) fun main(a: Address): UFix64 { return 1.0 }".to_string(),
            "e385412159992e11",
            vec!["A.1654653399040a61.FlowToken.Vault".to_string()],
        );
        assert_eq!(oracle.feed_address, "0xe385412159992e11");
        let err = oracle.usd_rate("A.ead892083b3e2c6c.DapperUtilityCoin.Vault").await.unwrap_err();
        assert!(matches!(err, OracleError::UnknownVault(_)));
    }
}
