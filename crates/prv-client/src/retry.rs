//! Exponential backoff with additive jitter.
//!
//! The delay before retry `n` (0-based) is `min(base * 2^n, cap)` plus a
//! uniformly random jitter in `[0, jitter)`. The deterministic part is a pure
//! function of the attempt number so it can be tested on its own.

use std::time::Duration;

use rand::Rng;

use crate::error::ClientError;

/// Retry schedule for registry reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub jitter: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            cap: Duration::from_millis(30_000),
            jitter: Duration::from_millis(1_000),
            max_retries: 3,
        }
    }
}

impl BackoffPolicy {
    /// `min(base * 2^attempt, cap)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// A random jitter sample in `[0, jitter)`.
    pub fn jitter_sample(&self) -> Duration {
        let bound = self.jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }

    /// Delay to wait after failed attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.jitter_sample()
    }

    /// Whether `error` on attempt `attempt` should be retried.
    pub fn should_retry(&self, attempt: u32, error: &ClientError) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }
}
