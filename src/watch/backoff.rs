//! Retry pacing for the watch loop.
//!
//! Both the delay policy and the sleep itself are injectable, so the loop can
//! be driven in tests without real timers.

use async_trait::async_trait;
use std::time::Duration;

/// Chooses the delay before the next attempt.
pub trait Backoff: Send {
    /// Delay before the next retry.
    fn next_delay(&mut self) -> Duration;

    /// Called after a successful listing.
    fn reset(&mut self);
}

/// The same delay every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    interval: Duration,
}

impl FixedBackoff {
    /// Creates a fixed backoff.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Backoff for FixedBackoff {
    fn next_delay(&mut self) -> Duration {
        self.interval
    }

    fn reset(&mut self) {}
}

/// Waits for a delay.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
