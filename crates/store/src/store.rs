//! Concurrent key -> entry map

use crate::entry::StateEntry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use txstream_common::{Key, Value};

/// Keyed value store shared by all worker threads
///
/// `get`/`put` are individually race-free but not transactional; callers go
/// through a concurrency controller for isolation.
#[derive(Debug, Default)]
pub struct StateStore {
    entries: DashMap<Key, Arc<StateEntry>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with initial values
    pub fn with_values(values: impl IntoIterator<Item = (Key, Value)>) -> Self {
        let store = Self::new();
        for (key, value) in values {
            store.put(key, value);
        }
        store
    }

    /// Get the entry for a key, creating an empty one if absent
    ///
    /// Controllers need an entry to attach metadata to even before the first
    /// write to the key.
    pub fn entry(&self, key: Key) -> Arc<StateEntry> {
        if let Some(entry) = self.entries.get(&key) {
            return entry.value().clone();
        }
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(StateEntry::new(key)))
            .value()
            .clone()
    }

    /// Get the entry for a key without creating it
    pub fn find(&self, key: Key) -> Option<Arc<StateEntry>> {
        self.entries.get(&key).map(|e| e.value().clone())
    }

    pub fn get(&self, key: Key) -> Option<Value> {
        self.find(key).and_then(|entry| entry.get())
    }

    /// Store a value, returning the previous one
    pub fn put(&self, key: Key, value: Value) -> Option<Value> {
        self.entry(key).put(value)
    }

    /// Check if a key currently holds a value
    pub fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries (including entries created only for metadata)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of every key that holds a value
    pub fn snapshot(&self) -> BTreeMap<Key, Value> {
        self.entries
            .iter()
            .filter_map(|e| e.value().get().map(|v| (*e.key(), v)))
            .collect()
    }
}
