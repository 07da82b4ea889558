//! Per-event transaction context
//!
//! A context is created fresh for every micro-event and is owned by the worker
//! thread executing it. Besides the identity fields it carries the admission
//! footprint: what the installed controller granted, and (for optimistic
//! reads) the snapshot captured at admission time. Only controllers write the
//! footprint.

use crate::{Access, BatchId, FunctionId, Key, TxnId, Value};

/// Metadata for one transaction (one micro-event)
#[derive(Debug, Clone)]
pub struct TransactionContext {
    /// Worker thread executing the event
    pub thread_id: usize,
    /// Operator the event belongs to
    pub function_id: FunctionId,
    /// Batch id of the event (its position in the global stream)
    pub batch_id: BatchId,
    /// Set after the first failed admission and never cleared
    pub is_retry: bool,

    admitted: Option<Access>,
    keys: Vec<Key>,
    snapshot: Vec<(Key, Option<Value>)>,
}

impl TransactionContext {
    pub fn new(thread_id: usize, function_id: FunctionId, batch_id: BatchId) -> Self {
        Self {
            thread_id,
            function_id,
            batch_id,
            is_retry: false,
            admitted: None,
            keys: Vec::new(),
            snapshot: Vec::new(),
        }
    }

    /// Identity used for lock ownership
    pub fn txn_id(&self) -> TxnId {
        TxnId::new(self.function_id, self.batch_id)
    }

    /// Mark this context as retrying after a failed admission
    pub fn mark_retry(&mut self) {
        self.is_retry = true;
    }

    /// Access mode granted by the controller, if admitted
    pub fn admission(&self) -> Option<Access> {
        self.admitted
    }

    /// Keys covered by the current admission, ascending
    pub fn admitted_keys(&self) -> &[Key] {
        &self.keys
    }

    /// Check whether a key is covered by the current admission
    pub fn is_admitted(&self, key: Key) -> bool {
        self.admitted.is_some() && self.keys.binary_search(&key).is_ok()
    }

    /// Record a successful admission
    pub fn record_admission(&mut self, access: Access, keys: &[Key]) {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        self.admitted = Some(access);
        self.keys = keys;
    }

    /// Store a value captured at admission time
    pub fn stash_read(&mut self, key: Key, value: Option<Value>) {
        self.snapshot.push((key, value));
    }

    /// Value captured at admission time for `key`, if any was captured
    pub fn stashed_read(&self, key: Key) -> Option<&Option<Value>> {
        self.snapshot
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    /// Drop any captured values (used when an admission attempt is rolled back)
    pub fn clear_snapshot(&mut self) {
        self.snapshot.clear();
    }

    /// Clear the admission footprint, returning the keys it covered
    pub fn clear_admission(&mut self) -> Vec<Key> {
        self.admitted = None;
        self.snapshot.clear();
        std::mem::take(&mut self.keys)
    }
}
