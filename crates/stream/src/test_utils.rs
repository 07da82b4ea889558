//! Common test utilities for executor tests

use crate::controller::ConcurrencyController;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use txstream_common::{Access, BatchId, Key, TransactionContext, Value};
use txstream_store::StateStore;

/// Controller that admits everything unless told to refuse
///
/// Records commit/abort order so tests can check what the executor did.
pub struct GateController {
    store: StateStore,
    refusals: AtomicU32,
    committed: Mutex<Vec<BatchId>>,
    aborted: Mutex<Vec<BatchId>>,
}

impl GateController {
    pub fn new() -> Self {
        Self::with_values(Vec::new())
    }

    pub fn with_values(values: Vec<(Key, Value)>) -> Self {
        Self {
            store: StateStore::with_values(values),
            refusals: AtomicU32::new(0),
            committed: Mutex::new(Vec::new()),
            aborted: Mutex::new(Vec::new()),
        }
    }

    /// Refuse the next `n` admission attempts
    pub fn refuse_next(&self, n: u32) {
        self.refusals.store(n, Ordering::SeqCst);
    }

    pub fn committed(&self) -> Vec<BatchId> {
        self.committed.lock().clone()
    }

    pub fn aborted(&self) -> Vec<BatchId> {
        self.aborted.lock().clone()
    }

    fn admit(&self, ctx: &mut TransactionContext, access: Access, keys: &[Key]) -> bool {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return false;
        }
        ctx.record_admission(access, keys);
        true
    }
}

impl ConcurrencyController for GateController {
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.admit(ctx, Access::Read, keys)
    }

    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.admit(ctx, Access::Write, keys)
    }

    fn commit(&self, ctx: &mut TransactionContext) {
        ctx.clear_admission();
        self.committed.lock().push(ctx.batch_id);
    }

    fn abort(&self, ctx: &mut TransactionContext) {
        ctx.clear_admission();
        self.aborted.lock().push(ctx.batch_id);
    }

    fn store(&self) -> &StateStore {
        &self.store
    }

    fn protocol_name(&self) -> &'static str {
        "gate"
    }
}
