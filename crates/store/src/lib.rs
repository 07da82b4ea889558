//! Shared in-memory state store
//!
//! The store is a concurrent map from key to [`StateEntry`]. It provides no
//! atomicity of its own: every entry carries [`ControlMetadata`] that the
//! installed concurrency controller uses to decide who may touch the value.
//!
//! ## Layout
//!
//! - [`StateStore`]: key -> entry map, `get`/`put` on values
//! - [`StateEntry`]: the value plus its control metadata
//! - [`KeyLock`]: per-key shared/exclusive holder table used by lock-based control

pub mod entry;
pub mod lock;
pub mod store;

pub use entry::{ControlMetadata, StateEntry};
pub use lock::{KeyLock, LockAttemptResult, LockMode};
pub use store::StateStore;
