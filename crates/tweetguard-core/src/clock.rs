use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Source of deliberate waits.
///
/// The engine never calls `tokio::time::sleep` directly; every settle delay
/// and backoff goes through a `Clock` so scenarios can run without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waits on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested waits and returns immediately.
///
/// Yields to the scheduler on every call so signals raised by other tasks
/// are still observed between steps.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    slept: Arc<Mutex<Vec<Duration>>>,
    /// Skip the history; for long-lived instant runs nobody inspects
    unrecorded: bool,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that returns immediately and keeps no history.
    pub fn unrecorded() -> Self {
        Self {
            slept: Arc::default(),
            unrecorded: true,
        }
    }

    /// Every wait requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }

    /// Sum of every wait requested so far.
    pub fn elapsed(&self) -> Duration {
        self.slept.lock().iter().sum()
    }

    /// How many times exactly `duration` was requested.
    pub fn count_of(&self, duration: Duration) -> usize {
        self.slept.lock().iter().filter(|d| **d == duration).count()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        if !self.unrecorded {
            self.slept.lock().push(duration);
        }
        tokio::task::yield_now().await;
    }
}
