//! Error types for the runner

use crate::lifecycle::WorkerId;
use std::time::Duration;
use thiserror::Error;

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Runner errors
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Unknown worker: {0}")]
    UnknownWorker(WorkerId),

    #[error("Worker {worker} failed: {source}")]
    WorkerFailed {
        worker: WorkerId,
        source: txstream_stream::Error,
    },

    #[error("Worker {0} panicked")]
    WorkerPanicked(WorkerId),

    #[error("Timed out after {timeout:?} waiting for worker {worker}")]
    JoinTimeout { worker: WorkerId, timeout: Duration },

    #[error("Worker {0} cannot join itself")]
    SelfJoin(WorkerId),

    #[error("Wait interrupted")]
    Interrupted,
}

impl RunnerError {
    /// Interruption is a shutdown signal, not an application failure
    pub fn is_interruption(&self) -> bool {
        matches!(self, RunnerError::Interrupted)
    }
}
