//! Flow Access REST client.
//!
//! Thin wrapper over the endpoints the bot needs: sealed height, events by
//! height range, transaction results and read-only script execution.

use crate::cadence::{decode_value, RawEvent, Value};
use crate::flow::fetcher::TxEventSource;
use crate::flow::types::{Block, BlockEvents, TransactionResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("access node returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Body(String),
    #[error("results for {tx_id} not indexed after {attempts} attempts")]
    NotIndexed { tx_id: String, attempts: u32 },
}

impl FetchError {
    /// Transport failures and 5xx answers are worth retrying for calls that
    /// have no "not there yet" state of their own.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct FlowClient {
    rest_url: String,
    http: Client,
}

impl FlowClient {
    pub fn new(rest_url: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(FetchError::Http { status, body })
    }

    /// Height of the latest sealed block.
    pub async fn sealed_height(&self) -> Result<u64, FetchError> {
        let url = format!("{}/v1/blocks", self.rest_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("height", "sealed")])
            .send()
            .await?;
        let blocks: Vec<Block> = Self::check(resp).await?.json().await?;
        blocks
            .first()
            .map(|b| b.header.height)
            .ok_or_else(|| FetchError::Body("no sealed block in response".to_string()))
    }

    /// Events of one type in `start..=end`. The access node caps the range
    /// at 250 blocks; callers chunk larger spans.
    pub async fn events_in_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<RawEvent>, FetchError> {
        let url = format!("{}/v1/events", self.rest_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("type", event_type.to_string()),
                ("start_height", start.to_string()),
                ("end_height", end.to_string()),
            ])
            .send()
            .await?;
        let blocks: Vec<BlockEvents> = Self::check(resp).await?.json().await?;

        let events: Vec<RawEvent> = blocks
            .into_iter()
            .flat_map(|block| {
                let height = block.block_height;
                block
                    .events
                    .into_iter()
                    .map(move |e| e.into_raw(Some(height)))
            })
            .collect();

        debug!(
            event_type = event_type,
            start = start,
            end = end,
            events = events.len(),
            "fetched events"
        );
        Ok(events)
    }

    /// Transaction result, or `None` while the node has not indexed it yet.
    pub async fn transaction_result(
        &self,
        tx_id: &str,
    ) -> Result<Option<TransactionResult>, FetchError> {
        let url = format!("{}/v1/transaction_results/{}", self.rest_url, tx_id);
        let resp = self.http.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let result: TransactionResult = Self::check(resp).await?.json().await?;
        Ok(Some(result))
    }

    /// Execute a read-only Cadence script against the sealed state.
    ///
    /// `args` are JSON-Cadence nodes such as
    /// `{"type": "Address", "value": "0x..."}`.
    pub async fn execute_script(
        &self,
        script: &str,
        args: &[serde_json::Value],
    ) -> Result<Value, FetchError> {
        let url = format!("{}/v1/scripts", self.rest_url);
        let body = serde_json::json!({
            "script": BASE64.encode(script),
            "arguments": args
                .iter()
                .map(|a| BASE64.encode(a.to_string()))
                .collect::<Vec<_>>(),
        });
        let resp = self
            .http
            .post(&url)
            .query(&[("block_height", "sealed")])
            .json(&body)
            .send()
            .await?;

        // The response is a JSON string holding base64 JSON-Cadence.
        let encoded: String = Self::check(resp).await?.json().await?;
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| FetchError::Body(format!("script result is not base64: {e}")))?;
        let doc: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Body(format!("script result is not JSON: {e}")))?;
        decode_value(&doc).map_err(|e| FetchError::Body(e.to_string()))
    }
}

#[async_trait]
impl TxEventSource for FlowClient {
    async fn transaction_events(&self, tx_id: &str) -> Result<Option<Vec<RawEvent>>, FetchError> {
        let Some(result) = self.transaction_result(tx_id).await? else {
            return Ok(None);
        };
        if !result.error_message.is_empty() {
            debug!(tx_id = tx_id, error = %result.error_message, "transaction reported an error");
        }
        Ok(Some(
            result
                .events
                .into_iter()
                .map(|e| e.into_raw(None))
                .collect(),
        ))
    }
}
