//! Process-wide stop flag
//!
//! Cloned into every serving loop and the reporter ticker. Flipped by the
//! signal handler or by a remote `/shutdown` (when allowed). Loops poll it
//! between bounded waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    stopped: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing flag (e.g. one a signal handler writes to).
    pub fn from_flag(stopped: Arc<AtomicBool>) -> Self {
        Self { stopped }
    }

    #[inline]
    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        !self.is_triggered()
    }
}
