//! Retry policy for transient fetch failures

use crate::config::EngineConfig;
use std::time::Duration;

/// Exponential backoff bounded by a retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RetryPolicy {
    pub fn from_engine(engine: &EngineConfig) -> Self {
        Self {
            retries: engine.per_task_retries,
            base: engine.retry_backoff(),
            max: engine.max_backoff(),
        }
    }

    /// Total attempts a task gets, counting the first one
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }
}
