//! Bounded retry policy for page loads

use crate::config::CrawlerConfig;
use rand::Rng;
use std::time::Duration;

/// Upper bound on a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// How often and how patiently a timed-out load is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total load attempts, first one included
    pub max_attempts: u32,

    /// Delay before the first retry; doubles for every later one
    pub base_backoff: Duration,

    /// Random extra delay, as a percentage of the computed delay
    pub jitter_percent: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            jitter_percent: 10,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_load_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// True if another attempt may follow attempt number `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_backoff.as_millis() as u64;
        let exponent = attempt.saturating_sub(1).min(20);
        let delay_ms = base_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(MAX_BACKOFF.as_millis() as u64);

        let jitter_ms = if self.jitter_percent > 0 && delay_ms > 0 {
            let span = delay_ms * self.jitter_percent / 100;
            rand::thread_rng().gen_range(0..=span)
        } else {
            0
        };

        Duration::from_millis(delay_ms + jitter_ms)
    }
}
