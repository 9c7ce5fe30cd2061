//! Lookup retry policies for interaction steps.
//!
//! Each step of the report protocol waits for the remote surface to settle,
//! looks its control up, and on a miss backs off and looks again. The triple
//! (settle, backoff, attempts) is a [`StepPolicy`]; delays are applied through
//! a [`Clock`](crate::clock::Clock) so tests never wait on wall-clock time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lookup policy for one interaction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepPolicy {
    /// Delay before the first lookup (milliseconds).
    pub settle_ms: u64,
    /// Delay between a missed lookup and the next one (milliseconds).
    pub backoff_ms: u64,
    /// Total lookups, including the first. Zero is treated as one.
    pub max_attempts: u32,
}

impl Default for StepPolicy {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            backoff_ms: 5_000,
            max_attempts: 2,
        }
    }
}

impl StepPolicy {
    #[must_use]
    pub const fn new(settle_ms: u64, backoff_ms: u64, max_attempts: u32) -> Self {
        Self {
            settle_ms,
            backoff_ms,
            max_attempts,
        }
    }

    /// Builder: set the settle delay.
    #[must_use]
    pub const fn with_settle_ms(mut self, ms: u64) -> Self {
        self.settle_ms = ms;
        self
    }

    /// Builder: set the backoff between lookups.
    #[must_use]
    pub const fn with_backoff_ms(mut self, ms: u64) -> Self {
        self.backoff_ms = ms;
        self
    }

    /// Builder: set the number of lookups.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Number of lookups actually performed.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Whether another lookup follows a miss on `attempt` (1-indexed).
    pub fn has_retry_after(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }
}
