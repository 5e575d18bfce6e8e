//! Bounded retry with exponential backoff.
//!
//! Every network call that has to ride out access-node indexing lag goes
//! through one [`RetryPolicy`]. The operation itself decides whether an
//! outcome is worth another attempt, so "valid response, nothing there yet"
//! and "the request blew up" can be handled differently by each caller.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Result of one attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished successfully.
    Done(T),
    /// Transient condition; try again after the backoff delay.
    Retry(String),
    /// Terminal failure; stop immediately.
    Fail(E),
}

#[derive(Error, Debug)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last_reason}")]
    Exhausted { attempts: u32, last_reason: String },
    #[error("{0}")]
    Failed(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; it is clamped to at least one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep taken before `attempt` (1-based). The first attempt runs
    /// immediately; after that the delay doubles: base, 2×base, 4×base, ...
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// The full sleep schedule between attempts.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (2..=self.max_attempts).map(|attempt| self.delay_before(attempt))
    }

    /// Drive `op` until it finishes, fails terminally, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let mut last_reason = String::new();

        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(err) => return Err(RetryError::Failed(err)),
                Attempt::Retry(reason) => {
                    if attempt < self.max_attempts {
                        let delay = self.delay_before(attempt + 1);
                        debug!(
                            op = what,
                            attempt = attempt,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            reason = %reason,
                            "retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_reason = reason;
                }
            }
        }

        warn!(
            op = what,
            attempts = self.max_attempts,
            reason = %last_reason,
            "retries exhausted"
        );
        Err(RetryError::Exhausted {
            attempts: self.max_attempts,
            last_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        let delays: Vec<u64> = policy.delays().map(|d| d.as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 8]);
        assert_eq!(policy.delay_before(1), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.delays().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_exactly_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let mut calls = 0u32;
        let start = Instant::now();

        let result: Result<(), RetryError<String>> = policy
            .run("always empty", |_| {
                calls += 1;
                async { Attempt::Retry("zero events".to_string()) }
            })
            .await;

        assert_eq!(calls, 3);
        assert!(matches!(
            result,
            Err(RetryError::Exhausted { attempts: 3, ref last_reason }) if last_reason == "zero events"
        ));
        // 2s before attempt 2, 4s before attempt 3, nothing after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(2));
        let mut calls = 0u32;
        let start = Instant::now();

        let result: Result<(), RetryError<&str>> = policy
            .run("transport", |_| {
                calls += 1;
                async { Attempt::Fail("connection refused") }
            })
            .await;

        assert_eq!(calls, 1);
        assert!(matches!(result, Err(RetryError::Failed("connection refused"))));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_later_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = Instant::now();

        let result: Result<u32, RetryError<()>> = policy
            .run("eventually", |attempt| async move {
                if attempt < 2 {
                    Attempt::Retry("not yet".to_string())
                } else {
                    Attempt::Done(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }
}
