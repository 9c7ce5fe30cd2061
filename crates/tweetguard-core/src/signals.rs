use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Operator signals shared between the console and a running engine.
///
/// Stop is sticky until [`RunSignals::clear_stop`]; pause is consumed by the
/// pass loop the first time it is observed.
#[derive(Debug, Clone, Default)]
pub struct RunSignals {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl RunSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn request_pause(&self) {
        self.pause.store(true, Ordering::SeqCst);
    }

    pub fn is_pause_requested(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }

    /// Reset both flags before a new run.
    pub fn clear(&self) {
        self.clear_stop();
        self.pause.store(false, Ordering::SeqCst);
    }

    /// Consume a pending pause request.
    pub fn take_pause(&self) -> bool {
        self.pause.swap(false, Ordering::SeqCst)
    }
}
