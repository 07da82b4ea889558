//! Cooperative cancellation flag shared between a worker and its lifecycle owner

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared run flag; cleared once to request a cooperative stop
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    /// Create a flag in the running state
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Request a stop; returns true if this call cleared the flag
    pub fn stop(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}
