//! Transaction event fetching with indexing-lag tolerance.
//!
//! A `ListingCompleted` event can be visible before the access node has
//! indexed the rest of its transaction. An absent result or an empty event
//! list is retried under the configured [`RetryPolicy`]; transport and HTTP
//! failures are not.

use crate::cadence::RawEvent;
use crate::flow::client::FetchError;
use crate::retry::{Attempt, RetryError, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Ordered events emitted by one transaction.
pub type TxEvents = Vec<RawEvent>;

/// Anything that can list a transaction's events.
#[async_trait]
pub trait TxEventSource: Send + Sync {
    /// `Ok(None)` means the result is not indexed yet.
    async fn transaction_events(&self, tx_id: &str) -> Result<Option<TxEvents>, FetchError>;
}

#[derive(Clone)]
pub struct TransactionFetcher {
    source: Arc<dyn TxEventSource>,
    policy: RetryPolicy,
}

impl TransactionFetcher {
    pub fn new(source: Arc<dyn TxEventSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub async fn fetch(&self, tx_id: &str) -> Result<TxEvents, FetchError> {
        let source = &self.source;
        let result = self
            .policy
            .run("transaction results", |attempt| async move {
                match source.transaction_events(tx_id).await {
                    Ok(Some(events)) if !events.is_empty() => {
                        debug!(
                            tx_id = tx_id,
                            attempt = attempt,
                            events = events.len(),
                            "transaction events fetched"
                        );
                        Attempt::Done(events)
                    }
                    Ok(Some(_)) => Attempt::Retry("zero events".to_string()),
                    Ok(None) => Attempt::Retry("result not indexed".to_string()),
                    Err(e) => Attempt::Fail(e),
                }
            })
            .await;

        match result {
            Ok(events) => Ok(events),
            Err(RetryError::Failed(e)) => Err(e),
            Err(RetryError::Exhausted { attempts, .. }) => Err(FetchError::NotIndexed {
                tx_id: tx_id.to_string(),
                attempts,
            }),
        }
    }
}
