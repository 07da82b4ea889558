//! Worker runtime: configuration, fair batch allocation, thread lifecycle
//! and the worker pool that drives batch executors

mod allocator;
mod config;
mod context;
mod error;
mod lifecycle;
mod pool;

pub use allocator::BatchAllocator;
pub use config::RunnerConfig;
pub use context::RuntimeContext;
pub use error::{Result, RunnerError};
pub use lifecycle::{WorkerId, WorkerRegistry, WorkerSeat};
pub use pool::{WorkerPool, WorkerReport};

// Re-export the protocol selector for convenience
pub use txstream_concurrency::Protocol;
