//! USD normalization of sale amounts.
//!
//! USD-denominated vaults pass through untouched. Everything else is priced
//! through a [`RateOracle`], with the last rate held in a single TTL-bounded
//! slot owned by the converter.

pub mod oracle;

pub use oracle::{CoinbaseOracle, OracleError, RateOracle, ScriptOracle};

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct CachedRate {
    vault_type: String,
    rate: Decimal,
    fetched_at: Instant,
}

/// Single cached `(rate, timestamp)` slot.
#[derive(Debug)]
pub struct PriceCache {
    ttl: Duration,
    slot: Option<CachedRate>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    /// Cached rate for `vault_type` if it is younger than the TTL.
    pub fn get(&self, vault_type: &str, now: Instant) -> Option<Decimal> {
        self.slot
            .as_ref()
            .filter(|c| c.vault_type == vault_type)
            .filter(|c| now.saturating_duration_since(c.fetched_at) < self.ttl)
            .map(|c| c.rate)
    }

    pub fn put(&mut self, vault_type: &str, rate: Decimal, now: Instant) {
        self.slot = Some(CachedRate {
            vault_type: vault_type.to_string(),
            rate,
            fetched_at: now,
        });
    }
}

pub struct PriceConverter {
    oracle: Arc<dyn RateOracle>,
    cache: PriceCache,
    usd_vaults: Vec<String>,
}

impl PriceConverter {
    pub fn new(oracle: Arc<dyn RateOracle>, usd_vaults: Vec<String>, ttl: Duration) -> Self {
        Self {
            oracle,
            cache: PriceCache::new(ttl),
            usd_vaults,
        }
    }

    /// Vault types match on their contract suffix (`DapperUtilityCoin.Vault`)
    /// as well as the full `A.<address>.` identifier.
    pub fn is_usd_vault(&self, vault_type: &str) -> bool {
        self.usd_vaults
            .iter()
            .any(|v| vault_type == v || vault_type.ends_with(&format!(".{v}")))
    }

    /// USD value of `raw_amount`, or `None` when the sale cannot be priced.
    pub async fn usd_price(&mut self, vault_type: &str, raw_amount: Decimal) -> Option<Decimal> {
        if self.is_usd_vault(vault_type) {
            return Some(raw_amount);
        }
        let rate = self.rate(vault_type).await?;
        let usd = raw_amount.checked_mul(rate);
        if usd.is_none() {
            warn!(
                vault_type = vault_type,
                amount = %raw_amount,
                rate = %rate,
                "usd conversion overflowed"
            );
        }
        usd
    }

    async fn rate(&mut self, vault_type: &str) -> Option<Decimal> {
        let now = Instant::now();
        if let Some(rate) = self.cache.get(vault_type, now) {
            debug!(vault_type = vault_type, rate = %rate, "rate cache hit");
            return Some(rate);
        }

        match self.oracle.usd_rate(vault_type).await {
            Ok(rate) if rate > Decimal::ZERO => {
                self.cache.put(vault_type, rate, now);
                Some(rate)
            }
            Ok(rate) => {
                warn!(vault_type = vault_type, rate = %rate, "oracle returned non-positive rate");
                None
            }
            Err(e) => {
                warn!(vault_type = vault_type, error = %e, "oracle query failed");
                None
            }
        }
    }

    /// Human-readable price used in posts.
    pub fn display_price(&self, vault_type: &str, raw_amount: Decimal, usd: Decimal) -> String {
        if self.is_usd_vault(vault_type) {
            format!("${:.2} USD", usd.round_dp(2))
        } else {
            format!(
                "{} {} (~${:.2} USD)",
                raw_amount.normalize(),
                token_symbol(vault_type),
                usd.round_dp(2)
            )
        }
    }
}

/// Short ticker for a vault type: `A.1654653399040a61.FlowToken.Vault` is `FLOW`.
pub fn token_symbol(vault_type: &str) -> String {
    let contract = vault_type
        .rsplit('.')
        .nth(1)
        .unwrap_or(vault_type);
    match contract {
        "FlowToken" => "FLOW".to_string(),
        "FiatToken" => "USDC".to_string(),
        "DapperUtilityCoin" => "DUC".to_string(),
        other => other.trim_end_matches("Token").to_uppercase(),
    }
}
