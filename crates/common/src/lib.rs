//! Common types for txstream
//!
//! This crate defines:
//! - Identifiers shared by every layer (keys, event ids, batch ids)
//! - The typed value stored under a key
//! - Micro-events and their read/write access mode
//! - Transaction identity and the per-event transaction context
//! - The cooperative run flag checked by worker loops

mod context;
mod event;
mod run_flag;
mod transaction_id;
mod value;

pub use context::TransactionContext;
pub use event::{Access, Event};
pub use run_flag::RunFlag;
pub use transaction_id::TxnId;
pub use value::Value;

/// Key into the shared state store
pub type Key = u64;

/// Position of an event in the global stream
pub type EventId = u64;

/// Batch identifier; the bid of the first event in a combo batch, or of a
/// single event when carried by a transaction context
pub type BatchId = u64;

/// Operator (function) identifier
pub type FunctionId = u32;
