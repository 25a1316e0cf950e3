//! Retry policy for provider calls.
//!
//! Only rate limiting (HTTP 429) is retried, with exponential backoff.
//! Everything else is treated as permanent for the current fetch:
//! - Timeouts and connection failures
//! - Non-2xx statuses other than 429
//! - Undecodable or incomplete payloads

use std::time::Duration;

use travelcast_core::FetchConfig;

use crate::types::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_SECS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch, including the first
    pub max_attempts: u32,
    /// Delay before the first retry (doubles each attempt)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.backoff_base_secs),
        )
    }

    /// Backoff after the 0-based `attempt` failed: `base_delay * 2^attempt`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt follows the 0-based `attempt`
    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

pub fn classify(error: &FetchError) -> RetryDecision {
    match error {
        FetchError::RateLimited => RetryDecision::Retry,
        _ => RetryDecision::GiveUp,
    }
}
