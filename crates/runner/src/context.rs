use crate::allocator::BatchAllocator;
use crate::config::RunnerConfig;
use crate::lifecycle::WorkerRegistry;

/// Shared state of one runtime: the batch allocator and the worker registry
///
/// Owned by the pool and handed to each worker through an `Arc`, so separate
/// runtimes (and tests) never share counters.
pub struct RuntimeContext {
    allocator: BatchAllocator,
    registry: WorkerRegistry,
}

impl RuntimeContext {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            allocator: BatchAllocator::new(config.combo_size),
            registry: WorkerRegistry::new(config),
        }
    }

    pub fn allocator(&self) -> &BatchAllocator {
        &self.allocator
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }
}
