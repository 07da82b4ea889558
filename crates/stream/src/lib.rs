//! Transactional batch execution for stream-processing workers
//!
//! This crate provides the per-worker execution loop that turns a run of
//! micro-events into transactions against the shared state store. Concurrency
//! control protocols implement the [`ConcurrencyController`] trait to plug
//! into the loop.
//!
//! ## Architecture
//!
//! The batch executor handles:
//! - Event lookup and read/write dispatch
//! - Admission and the unbounded admission-retry loop (with pluggable backoff)
//! - Exactly-once invocation of business logic after admission
//! - Commit, abort and retirement of unprocessed events
//! - Phase-boundary profiling hooks
//!
//! Controllers provide:
//! - Admission decisions for reads and writes
//! - Isolation of admitted keys until commit
//! - Finalization on commit and cleanup on abort

pub mod access;
pub mod controller;
pub mod error;
pub mod executor;
pub mod logic;
pub mod profiler;
pub mod retry;
pub mod source;

#[cfg(test)]
mod test_utils;

pub use access::TxnAccess;
pub use controller::ConcurrencyController;
pub use error::{Error, Result};
pub use executor::{BatchExecutor, BatchReport};
pub use logic::{BusinessLogic, PutGetLogic, WriteMode};
pub use profiler::{NoopProfiler, Phase, PhaseProfiler, Profiler};
pub use retry::{Backoff, RetryPolicy};
pub use source::{EventSource, VecEventSource};
