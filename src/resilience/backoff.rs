//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::schema::MAX_RETRY_DELAY_MS;
use crate::config::ControllerConfig;

/// Bounded exponential backoff for apply and resync retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Delay before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`
    /// capped at `max_ms`, plus up to 10% jitter. Attempt 0 waits nothing.
    pub fn delay(&self, attempt: u32) -> Duration {
        let Some(exponent) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let capped = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.max_ms);

        let jitter = match capped / 10 {
            0 => 0,
            range => rand::thread_rng().gen_range(0..range),
        };
        Duration::from_millis(capped + jitter)
    }
}

impl From<&ControllerConfig> for Backoff {
    fn from(config: &ControllerConfig) -> Self {
        let max_ms = config.retry_max_delay_ms.min(MAX_RETRY_DELAY_MS);
        Self::new(config.retry_base_delay_ms.min(max_ms), max_ms)
    }
}
