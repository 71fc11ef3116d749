use std::time::Duration;

use crate::error::ChatApiError;

/// Total delivery attempts per cycle, the initial one included.
pub const MAX_ATTEMPTS: u32 = 3;
/// Delay before the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Attempt budget and exponential backoff for one send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before retry number `retry` (zero-based): `base * 2^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.min(30);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
    }

    /// True when another attempt follows a failure on attempt `attempt` (one-based).
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Only failures of the transport call itself are worth repeating.
pub fn is_retryable(error: &ChatApiError) -> bool {
    error.is_network() || error.is_upstream()
}
