//! Watermark-ordered admission
//!
//! A global low watermark (lwm) holds the lowest batch id that has not been
//! retired. An event is admitted only once `lwm >= batch_id`, i.e. once
//! every earlier event in the stream has committed or been aborted. Commit
//! and abort both retire the event's batch id; ids retired out of order wait
//! in a pending set until the gap below them closes.
//!
//! Each entry's watermark records the batch after the last one that
//! committed against it. It is bookkeeping for visibility only and plays no
//! part in admission.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use txstream_common::{Access, BatchId, Key, TransactionContext};
use txstream_store::StateStore;
use txstream_stream::ConcurrencyController;

pub struct WatermarkController {
    store: Arc<StateStore>,
    lwm: AtomicU64,
    pending: Mutex<BTreeSet<BatchId>>,
}

impl WatermarkController {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self::starting_at(store, 0)
    }

    /// Create a controller for a stream whose first event id is `first`
    pub fn starting_at(store: Arc<StateStore>, first: BatchId) -> Self {
        Self {
            store,
            lwm: AtomicU64::new(first),
            pending: Mutex::new(BTreeSet::new()),
        }
    }

    /// Lowest batch id not yet retired
    pub fn lwm(&self) -> BatchId {
        self.lwm.load(Ordering::Acquire)
    }

    /// Watermark of a key: one past the last batch that committed to it
    pub fn key_watermark(&self, key: Key) -> BatchId {
        self.store
            .find(key)
            .map(|e| e.meta().visible_batch())
            .unwrap_or(0)
    }

    /// Number of ids retired ahead of the watermark
    pub fn pending_retirements(&self) -> usize {
        self.pending.lock().len()
    }

    fn admit(&self, ctx: &mut TransactionContext, access: Access, keys: &[Key]) -> bool {
        if self.lwm() < ctx.batch_id {
            return false;
        }
        ctx.record_admission(access, keys);
        true
    }

    /// Mark a batch id as finished and advance the watermark past any
    /// contiguous run of finished ids
    fn retire(&self, batch_id: BatchId) {
        let mut pending = self.pending.lock();

        let mut next = self.lwm.load(Ordering::Acquire);
        if batch_id < next {
            tracing::warn!("batch {} retired twice (watermark {})", batch_id, next);
            return;
        }

        pending.insert(batch_id);
        while pending.remove(&next) {
            next += 1;
        }
        self.lwm.store(next, Ordering::Release);
    }
}

impl ConcurrencyController for WatermarkController {
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.admit(ctx, Access::Read, keys)
    }

    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.admit(ctx, Access::Write, keys)
    }

    fn commit(&self, ctx: &mut TransactionContext) {
        let visible = ctx.batch_id + 1;
        for key in ctx.clear_admission() {
            self.store
                .entry(key)
                .meta()
                .watermark()
                .fetch_max(visible, Ordering::AcqRel);
        }
        self.retire(ctx.batch_id);
    }

    fn abort(&self, ctx: &mut TransactionContext) {
        ctx.clear_admission();
        self.retire(ctx.batch_id);
    }

    fn store(&self) -> &StateStore {
        &self.store
    }

    fn protocol_name(&self) -> &'static str {
        "watermark_ordered"
    }
}
