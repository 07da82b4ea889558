//! Concurrency controller trait that protocols must implement
//!
//! This trait defines the interface that lock-based, optimistic and
//! watermark-ordered protocols implement to work with the batch executor.

use txstream_common::{Access, Key, TransactionContext, Value};
use txstream_store::StateStore;

/// Admission control over the shared state store
///
/// Note: admission never blocks. A refused `try_read`/`try_write` has no side
/// effect, and the executor simply asks again. All methods take `&self`
/// because one controller is shared by every worker thread.
pub trait ConcurrencyController: Send + Sync {
    /// Ask to read `keys` now
    ///
    /// On `true` the values the caller reads stay valid until `commit` or
    /// `abort` is called for this context. On `false` nothing was changed.
    fn try_read(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool;

    /// Ask to write `keys` now
    ///
    /// On `true` the caller has exclusive write access to `keys` until
    /// `commit` or `abort`. On `false` nothing was changed.
    fn try_write(&self, ctx: &mut TransactionContext, keys: &[Key]) -> bool;

    /// Finalize an admitted transaction
    ///
    /// Releases everything the context holds. This is an infallible,
    /// non-blocking operation.
    fn commit(&self, ctx: &mut TransactionContext);

    /// Abandon a transaction without finalizing it
    ///
    /// Releases anything held and, for ordered protocols, retires the
    /// context's batch id so later batches are not stranded. Safe to call on
    /// a context that was never admitted.
    fn abort(&self, ctx: &mut TransactionContext);

    /// The state store this controller guards
    fn store(&self) -> &StateStore;

    /// Get the name of this protocol for logging and debugging
    fn protocol_name(&self) -> &'static str;

    /// Read a value on behalf of an admitted context
    fn read(&self, _ctx: &TransactionContext, key: Key) -> Option<Value> {
        self.store().get(key)
    }

    /// Write a value on behalf of a write-admitted context
    fn write(&self, _ctx: &TransactionContext, key: Key, value: Value) {
        self.store().put(key, value);
    }

    /// Dispatch to `try_read` or `try_write` by access mode
    fn try_admit(&self, ctx: &mut TransactionContext, access: Access, keys: &[Key]) -> bool {
        match access {
            Access::Read => self.try_read(ctx, keys),
            Access::Write => self.try_write(ctx, keys),
        }
    }
}
