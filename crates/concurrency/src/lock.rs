//! Lock-based admission
//!
//! Reads take shared locks, writes take exclusive locks, on every key of the
//! event. Locks live in each entry's control metadata. Acquisition walks the
//! keys in [`lock_order`] and never blocks: the first conflict releases
//! everything taken in the attempt and refuses admission. Locks are held
//! until commit or abort.

use crate::ordering::lock_order;
use std::sync::Arc;
use txstream_common::{Access, Key, TransactionContext};
use txstream_store::{LockAttemptResult, LockMode, StateStore};
use txstream_stream::ConcurrencyController;

pub struct LockBasedController {
    store: Arc<StateStore>,
}

impl LockBasedController {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    fn acquire(&self, ctx: &mut TransactionContext, access: Access, keys: &[Key]) -> bool {
        let txn = ctx.txn_id();
        let mode = match access {
            Access::Read => LockMode::Shared,
            Access::Write => LockMode::Exclusive,
        };

        let keys = lock_order(keys);
        let mut acquired = Vec::with_capacity(keys.len());

        for &key in &keys {
            let entry = self.store.entry(key);
            match entry.meta().lock().try_acquire(txn, mode) {
                LockAttemptResult::WouldGrant => acquired.push(entry),
                LockAttemptResult::Conflict { holders } => {
                    tracing::trace!(
                        "{} refused {:?} lock on key {}, held by {:?}",
                        txn,
                        mode,
                        key,
                        holders
                    );
                    for entry in acquired {
                        entry.meta().lock().release(txn);
                    }
                    return false;
                }
            }
        }

        ctx.record_admission(access, &keys);
        true
    }

    fn release_all(&self, ctx: &mut TransactionContext) {
        let txn = ctx.txn_id();
        for key in ctx.clear_admission() {
            if let Some(entry) = self.store.find(key) {
                entry.meta().lock().release(txn);
            }
        }
    }
}

impl ConcurrencyController for LockBasedController {
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.acquire(ctx, Access::Read, keys)
    }

    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.acquire(ctx, Access::Write, keys)
    }

    fn commit(&self, ctx: &mut TransactionContext) {
        self.release_all(ctx);
    }

    fn abort(&self, ctx: &mut TransactionContext) {
        self.release_all(ctx);
    }

    fn store(&self) -> &StateStore {
        &self.store
    }

    fn protocol_name(&self) -> &'static str {
        "lock_based"
    }
}
