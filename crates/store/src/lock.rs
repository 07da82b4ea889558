//! Per-key lock table
//!
//! Provides key-level locking with shared/exclusive modes. Each state entry
//! owns one [`KeyLock`]; acquisition never blocks, a conflicting request is
//! reported back to the caller together with the conflicting holders,
//! oldest first.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use txstream_common::TxnId;

/// Lock modes for key access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockMode {
    /// Shared lock for reading
    Shared,
    /// Exclusive lock for writing
    Exclusive,
}

impl LockMode {
    /// Check if two lock modes are compatible
    pub fn is_compatible_with(&self, other: LockMode) -> bool {
        matches!((*self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// One granted lock on a key
#[derive(Debug, Clone, Copy)]
struct Grant {
    holder: TxnId,
    mode: LockMode,
}

/// Result of an acquisition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LockAttemptResult {
    /// Lock is granted
    WouldGrant,
    /// Lock conflicts with existing locks
    Conflict {
        /// All transactions holding conflicting locks (sorted by age, oldest first)
        holders: Vec<(TxnId, LockMode)>,
    },
}

impl LockAttemptResult {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockAttemptResult::WouldGrant)
    }
}

/// Holder table for a single key
#[derive(Debug, Default)]
pub struct KeyLock {
    grants: Mutex<Vec<Grant>>,
}

impl KeyLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock if it is compatible with every current holder
    ///
    /// Check and grant happen under the same guard, so two callers can never
    /// both be granted incompatible modes.
    pub fn try_acquire(&self, tx_id: TxnId, mode: LockMode) -> LockAttemptResult {
        let mut grants = self.grants.lock();
        let mut conflicts: Vec<_> = grants
            .iter()
            // Re-entrant: a transaction never conflicts with itself
            .filter(|g| g.holder != tx_id && !g.mode.is_compatible_with(mode))
            .map(|g| (g.holder, g.mode))
            .collect();

        if !conflicts.is_empty() {
            conflicts.sort_by_key(|(txn, _)| *txn);
            return LockAttemptResult::Conflict { holders: conflicts };
        }

        grants.push(Grant {
            holder: tx_id,
            mode,
        });
        LockAttemptResult::WouldGrant
    }

    /// Release every lock this transaction holds on the key
    ///
    /// Returns true if anything was released.
    pub fn release(&self, tx_id: TxnId) -> bool {
        let mut grants = self.grants.lock();
        let before = grants.len();
        grants.retain(|g| g.holder != tx_id);
        grants.len() != before
    }

    /// Check if a transaction holds any lock on the key
    pub fn is_held_by(&self, tx_id: TxnId) -> bool {
        self.grants.lock().iter().any(|g| g.holder == tx_id)
    }

    pub fn is_free(&self) -> bool {
        self.grants.lock().is_empty()
    }
}
