//! Sealed-height polling of listing events.
//!
//! Each tick queries `(last, sealed]` for every configured listing event
//! type, split into spans the access node accepts, and feeds the events to
//! the handler one at a time in chain order. A failed range is retried on
//! the next tick because `last` only advances after a full batch.

use crate::cadence::RawEvent;
use crate::flow::{FetchError, FlowClient};
use crate::monitor::handler::SaleHandler;
use crate::retry::{Attempt, RetryError, RetryPolicy};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Block-range view of the access node.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn sealed_height(&self) -> Result<u64, FetchError>;

    async fn events_in_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<RawEvent>, FetchError>;
}

#[async_trait]
impl BlockSource for FlowClient {
    async fn sealed_height(&self) -> Result<u64, FetchError> {
        FlowClient::sealed_height(self).await
    }

    async fn events_in_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<RawEvent>, FetchError> {
        FlowClient::events_in_range(self, event_type, start, end).await
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub listing_types: Vec<String>,
    pub poll_interval: Duration,
    pub max_block_span: u64,
}

/// Inclusive `start..=end` split into spans of at most `span` blocks.
pub fn chunk_ranges(start: u64, end: u64, span: u64) -> Vec<(u64, u64)> {
    let span = span.max(1);
    let mut ranges = Vec::new();
    let mut from = start;
    while from <= end {
        let to = end.min(from.saturating_add(span - 1));
        ranges.push((from, to));
        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }
    ranges
}

pub struct BlockPoller {
    source: Arc<dyn BlockSource>,
    config: PollerConfig,
    policy: RetryPolicy,
}

impl BlockPoller {
    pub fn new(source: Arc<dyn BlockSource>, config: PollerConfig, policy: RetryPolicy) -> Self {
        Self {
            source,
            config,
            policy,
        }
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, op: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        let result = self
            .policy
            .run(what, |_| {
                let fut = op();
                async move {
                    match fut.await {
                        Ok(value) => Attempt::Done(value),
                        Err(e) if e.is_transient() => Attempt::Retry(e.to_string()),
                        Err(e) => Attempt::Fail(e),
                    }
                }
            })
            .await;
        match result {
            Ok(value) => Ok(value),
            Err(RetryError::Failed(e)) => Err(e),
            Err(RetryError::Exhausted { last_reason, .. }) => Err(FetchError::Body(last_reason)),
        }
    }

    pub async fn sealed_height(&self) -> Result<u64, FetchError> {
        self.with_retry("sealed height", || self.source.sealed_height())
            .await
    }

    /// All listing events in `start..=end`, ordered by
    /// `(block height, transaction index, event index)`.
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<RawEvent>, FetchError> {
        let mut events = Vec::new();
        for event_type in &self.config.listing_types {
            for (from, to) in chunk_ranges(start, end, self.config.max_block_span) {
                let batch = self
                    .with_retry("event range", || {
                        self.source.events_in_range(event_type, from, to)
                    })
                    .await?;
                events.extend(batch);
            }
        }
        events.sort_by_key(|e| (e.block_height.unwrap_or(0), e.transaction_index, e.event_index));
        Ok(events)
    }

    /// Process one block and return; used by test mode.
    pub async fn process_block(&self, handler: &mut SaleHandler, height: u64) -> Result<usize, FetchError> {
        let events = self.fetch_range(height, height).await?;
        let count = events.len();
        info!(height = height, events = count, "processing block");
        for event in events {
            let outcome = handler.handle(event).await;
            debug!(outcome = ?outcome, "event handled");
        }
        Ok(count)
    }

    /// Poll until `shutdown` flips to true. The event in flight when that
    /// happens is finished before returning.
    pub async fn run(
        &self,
        handler: &mut SaleHandler,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), FetchError> {
        let mut last = self.sealed_height().await?;
        info!(
            start_height = last,
            event_types = self.config.listing_types.len(),
            "polling sealed blocks"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = shutdown.changed() => break,
            }

            let current = match self.sealed_height().await {
                Ok(height) => height,
                Err(e) => {
                    warn!(error = %e, "sealed height unavailable");
                    continue;
                }
            };

            if current > last {
                match self.fetch_range(last + 1, current).await {
                    Ok(events) => {
                        debug!(from = last + 1, to = current, events = events.len(), "range fetched");
                        for event in events {
                            if *shutdown.borrow() {
                                break;
                            }
                            handler.handle(event).await;
                        }
                        last = current;
                    }
                    Err(e) => warn!(from = last + 1, to = current, error = %e, "range fetch failed"),
                }
            }

            handler.stats.maybe_report(Instant::now());
        }

        info!(last_height = last, "intake stopped");
        Ok(())
    }
}
