//! State entries and their protocol-specific control metadata

use crate::lock::KeyLock;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use txstream_common::{Key, Value};

/// Bookkeeping owned by the concurrency controller
///
/// Each protocol uses one part of it:
/// - lock-based control: the per-key holder table
/// - optimistic control: the seqlock version (odd while a writer is in progress)
/// - watermark ordering: the visible-batch watermark
///
/// Business logic never touches this; only controllers do.
#[derive(Debug, Default)]
pub struct ControlMetadata {
    lock: KeyLock,
    version: AtomicU64,
    watermark: AtomicU64,
}

impl ControlMetadata {
    pub fn lock(&self) -> &KeyLock {
        &self.lock
    }

    pub fn version(&self) -> &AtomicU64 {
        &self.version
    }

    pub fn watermark(&self) -> &AtomicU64 {
        &self.watermark
    }

    /// Current visible-batch watermark
    pub fn visible_batch(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }
}

/// A keyed value shared by all worker threads
#[derive(Debug)]
pub struct StateEntry {
    key: Key,
    value: RwLock<Option<Value>>,
    meta: ControlMetadata,
}

impl StateEntry {
    /// Create an entry with no value yet
    pub fn new(key: Key) -> Self {
        Self {
            key,
            value: RwLock::new(None),
            meta: ControlMetadata::default(),
        }
    }

    pub fn with_value(key: Key, value: Value) -> Self {
        Self {
            key,
            value: RwLock::new(Some(value)),
            meta: ControlMetadata::default(),
        }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Clone of the current value
    pub fn get(&self) -> Option<Value> {
        self.value.read().clone()
    }

    /// Replace the current value, returning the previous one
    pub fn put(&self, value: Value) -> Option<Value> {
        self.value.write().replace(value)
    }

    pub fn meta(&self) -> &ControlMetadata {
        &self.meta
    }
}
