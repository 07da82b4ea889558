//! Micro-events consumed by worker threads

use crate::{EventId, Key, Value};
use serde::{Deserialize, Serialize};

/// Whether an event reads or writes shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Read-only access (shared)
    Read,
    /// Read-write access (exclusive)
    Write,
}

impl Access {
    pub fn is_read(self) -> bool {
        self == Access::Read
    }
}

/// An immutable unit of work identified by its position in the stream
///
/// `keys` are the state keys the event touches. For write events `values`
/// is aligned with `keys`; read events carry no values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub access: Access,
    pub keys: Vec<Key>,
    pub values: Vec<Value>,
}

impl Event {
    /// Create a read event over the given keys
    pub fn read(id: EventId, keys: impl Into<Vec<Key>>) -> Self {
        Self {
            id,
            access: Access::Read,
            keys: keys.into(),
            values: Vec::new(),
        }
    }

    /// Create a write event assigning `values[i]` to `keys[i]`
    pub fn write(id: EventId, keys: impl Into<Vec<Key>>, values: impl Into<Vec<Value>>) -> Self {
        Self {
            id,
            access: Access::Write,
            keys: keys.into(),
            values: values.into(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.access.is_read()
    }

    /// Key/value pairs carried by a write event
    pub fn assignments(&self) -> impl Iterator<Item = (Key, &Value)> {
        self.keys.iter().copied().zip(self.values.iter())
    }
}
