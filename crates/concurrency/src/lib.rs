//! Concurrency control protocols for the batch executor
//!
//! Three interchangeable implementations of
//! [`ConcurrencyController`](txstream_stream::ConcurrencyController):
//!
//! - [`LockBasedController`]: per-key shared/exclusive locks acquired in
//!   ascending key order, all or nothing
//! - [`OptimisticController`]: per-key seqlock versions; readers validate a
//!   snapshot, writers claim keys by flipping the version odd
//! - [`WatermarkController`]: events are admitted strictly in stream order
//!   behind a low watermark of retired batch ids
//!
//! [`Controller`] wraps all three behind one type selected by [`Protocol`].

mod controller;
mod lock;
mod optimistic;
mod ordering;
mod protocol;
mod watermark;

pub use controller::Controller;
pub use lock::LockBasedController;
pub use optimistic::OptimisticController;
pub use ordering::lock_order;
pub use protocol::Protocol;
pub use watermark::WatermarkController;
