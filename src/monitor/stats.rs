use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Rolling counters, logged and reset every `interval`.
#[derive(Debug)]
pub struct Stats {
    pub events: u64,
    pub in_scope: u64,
    pub below_threshold: u64,
    pub skipped: u64,
    pub posted: u64,
    interval: Duration,
    window_start: Instant,
}

impl Stats {
    pub fn new(interval: Duration) -> Self {
        Self {
            events: 0,
            in_scope: 0,
            below_threshold: 0,
            skipped: 0,
            posted: 0,
            interval,
            window_start: Instant::now(),
        }
    }

    /// Log the status line once the window has elapsed. Returns true when
    /// a report was emitted.
    pub fn maybe_report(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.window_start) < self.interval {
            return false;
        }
        info!(
            events = self.events,
            in_scope = self.in_scope,
            below_threshold = self.below_threshold,
            skipped = self.skipped,
            posted = self.posted,
            window_secs = now.saturating_duration_since(self.window_start).as_secs(),
            "status"
        );
        self.reset(now);
        true
    }

    fn reset(&mut self, now: Instant) {
        self.events = 0;
        self.in_scope = 0;
        self.below_threshold = 0;
        self.skipped = 0;
        self.posted = 0;
        self.window_start = now;
    }
}
