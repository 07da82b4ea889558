//! Optimistic admission over per-key seqlock versions
//!
//! Every entry carries a version counter. An even version means the value is
//! stable; an odd version means a writer owns the key.
//!
//! - Writers claim each key (in [`lock_order`]) by moving its version from
//!   even to odd. A key that is already odd, or that changes under the claim,
//!   refuses admission and every claim made in the attempt is undone.
//!   Commit publishes the next even version.
//! - Readers snapshot all values between two version reads. If any key is
//!   odd, or any version moved, the snapshot is discarded and admission is
//!   refused. An admitted reader is served from its snapshot, so no
//!   validation is needed at commit.
//!
//! Refusals have no side effects, so a refused event costs nothing beyond
//! the retry itself.

use crate::ordering::lock_order;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use txstream_common::{Access, Key, TransactionContext, Value};
use txstream_store::{StateEntry, StateStore};
use txstream_stream::ConcurrencyController;

fn is_claimed(version: u64) -> bool {
    version & 1 == 1
}

pub struct OptimisticController {
    store: Arc<StateStore>,
}

impl OptimisticController {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// Current version of a key (0 for keys never touched)
    pub fn version(&self, key: Key) -> u64 {
        self.store
            .find(key)
            .map(|e| e.meta().version().load(Ordering::Acquire))
            .unwrap_or(0)
    }

    fn claim(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        let keys = lock_order(keys);
        let mut claimed: Vec<(Arc<StateEntry>, u64)> = Vec::with_capacity(keys.len());

        for &key in &keys {
            let entry = self.store.entry(key);
            let version = entry.meta().version().load(Ordering::Acquire);

            let won = !is_claimed(version)
                && entry
                    .meta()
                    .version()
                    .compare_exchange(version, version + 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();

            if !won {
                tracing::trace!("{} lost write claim on key {}", ctx.txn_id(), key);
                for (entry, previous) in claimed {
                    entry.meta().version().store(previous, Ordering::Release);
                }
                return false;
            }
            claimed.push((entry, version));
        }

        ctx.record_admission(Access::Write, &keys);
        true
    }

    fn snapshot(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        let keys = lock_order(keys);

        let mut observed: Vec<(Arc<StateEntry>, u64, Option<Value>)> =
            Vec::with_capacity(keys.len());
        for &key in &keys {
            let entry = self.store.entry(key);
            let version = entry.meta().version().load(Ordering::Acquire);
            if is_claimed(version) {
                return false;
            }
            let value = entry.get();
            observed.push((entry, version, value));
        }

        let stable = observed
            .iter()
            .all(|(entry, version, _)| entry.meta().version().load(Ordering::Acquire) == *version);
        if !stable {
            tracing::trace!("{} read snapshot invalidated", ctx.txn_id());
            return false;
        }

        ctx.clear_snapshot();
        for (entry, _, value) in observed {
            ctx.stash_read(entry.key(), value);
        }
        ctx.record_admission(Access::Read, &keys);
        true
    }

    /// Release write claims; `publish` moves to a new even version
    fn release(&self, ctx: &mut TransactionContext, publish: bool) {
        let was_write = ctx.admission() == Some(Access::Write);
        let keys = ctx.clear_admission();
        if !was_write {
            return;
        }

        for key in keys {
            if let Some(entry) = self.store.find(key) {
                let version = entry.meta().version();
                if publish {
                    version.fetch_add(1, Ordering::Release);
                } else {
                    version.fetch_sub(1, Ordering::Release);
                }
            }
        }
    }
}

impl ConcurrencyController for OptimisticController {
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.snapshot(ctx, keys)
    }

    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool {
        self.claim(ctx, keys)
    }

    fn commit(&self, ctx: &mut TransactionContext) {
        self.release(ctx, true);
    }

    /// Writes are buffered until commit, so an aborted writer has changed
    /// nothing and its keys go back to the version they had before the claim
    fn abort(&self, ctx: &mut TransactionContext) {
        self.release(ctx, false);
    }

    fn store(&self) -> &StateStore {
        &self.store
    }

    fn protocol_name(&self) -> &'static str {
        "optimistic_retry"
    }

    fn read(&self, ctx: &TransactionContext, key: Key) -> Option<Value> {
        match ctx.stashed_read(key) {
            Some(value) => value.clone(),
            None => self.store.get(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(batch_id: u64) -> TransactionContext {
        TransactionContext::new(0, 0, batch_id)
    }

    fn controller() -> OptimisticController {
        OptimisticController::new(Arc::new(StateStore::with_values(vec![
            (1, Value::Integer(1)),
            (2, Value::Integer(2)),
        ])))
    }

    #[test]
    fn test_write_publishes_even_version() {
        let controller = controller();
        let mut w = ctx(1);

        assert!(controller.try_write(&mut w, &[2, 1]));
        assert_eq!(controller.version(1), 1);
        assert_eq!(controller.version(2), 1);

        controller.write(&w, 1, Value::Integer(10));
        controller.commit(&mut w);
        assert_eq!(controller.version(1), 2);
        assert_eq!(controller.version(2), 2);
        assert_eq!(controller.store().get(1), Some(Value::Integer(10)));
    }

    #[test]
    fn test_claimed_key_refuses_everyone() {
        let controller = controller();
        let mut w = ctx(1);
        assert!(controller.try_write(&mut w, &[2]));

        let mut r = ctx(2);
        let mut w2 = ctx(3);
        assert!(!controller.try_read(&mut r, &[1, 2]));
        assert!(!controller.try_write(&mut w2, &[2, 1]));

        // Key 1 was claimed before the conflict on 2 and must be rolled back
        assert_eq!(controller.version(1), 0);
        assert_eq!(r.admission(), None);
        assert!(r.stashed_read(1).is_none());

        controller.commit(&mut w);
        assert!(controller.try_write(&mut w2, &[2, 1]));
    }

    #[test]
    fn test_abort_restores_version() {
        let controller = controller();
        let mut w = ctx(1);
        assert!(controller.try_write(&mut w, &[1]));
        controller.abort(&mut w);
        assert_eq!(controller.version(1), 0);
        assert_eq!(controller.store().get(1), Some(Value::Integer(1)));
    }

    #[test]
    fn test_reader_sees_admission_snapshot() {
        let controller = controller();
        let mut r = ctx(1);
        assert!(controller.try_read(&mut r, &[1, 3]));

        // Another writer commits after the reader was admitted
        let mut w = ctx(2);
        assert!(controller.try_write(&mut w, &[1]));
        controller.write(&w, 1, Value::Integer(99));
        controller.commit(&mut w);

        assert_eq!(controller.read(&r, 1), Some(Value::Integer(1)));
        assert_eq!(controller.read(&r, 3), None);
        controller.commit(&mut r);
        assert_eq!(controller.version(1), 2);
    }

    #[test]
    fn test_readers_do_not_block_writers() {
        let controller = controller();
        let mut r = ctx(1);
        assert!(controller.try_read(&mut r, &[1]));

        let mut w = ctx(2);
        assert!(controller.try_write(&mut w, &[1]));
        assert_eq!(controller.protocol_name(), "optimistic_retry");
    }
}
