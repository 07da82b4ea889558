//! Error types for batch execution
//!
//! Every variant is a storage fault: it aborts the event that raised it and
//! ends the batch. Admission failures are not errors; they stay inside the
//! executor's retry loop.

use thiserror::Error;
use txstream_common::{BatchId, EventId, Key};

/// Result type for execution operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while executing an admitted event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Missing key: {0}")]
    MissingKey(Key),

    #[error("Key {key} not admitted for batch {batch_id}")]
    KeyNotAdmitted { key: Key, batch_id: BatchId },

    #[error("Write to key {key} under read admission (batch {batch_id})")]
    WriteOnReadAccess { key: Key, batch_id: BatchId },

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("Logic error: {0}")]
    Logic(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Logic(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Logic(s)
    }
}
