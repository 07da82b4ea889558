//! Worker pool
//!
//! Spawns one named thread per configured worker. Each worker repeatedly
//! claims the next combo batch from the shared allocator and runs it through
//! its own [`BatchExecutor`] until the event source is exhausted, its run
//! flag is cleared, or a storage fault ends it.

use crate::config::RunnerConfig;
use crate::context::RuntimeContext;
use crate::error::{Result, RunnerError};
use crate::lifecycle::{WorkerId, WorkerSeat};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use txstream_concurrency::Controller;
use txstream_store::StateStore;
use txstream_stream::{
    BatchExecutor, BatchReport, BusinessLogic, ConcurrencyController, EventSource, PhaseProfiler,
};

/// What one worker did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub batches: u64,
    pub events: u64,
    pub retried_events: u64,
    pub failed_attempts: u64,
    /// The worker left because it was asked to stop
    pub stopped: bool,
}

impl WorkerReport {
    fn new(worker: WorkerId) -> Self {
        Self {
            worker: worker.index(),
            ..Default::default()
        }
    }

    fn absorb(&mut self, batch: &BatchReport) {
        self.batches += 1;
        self.events += batch.events;
        self.retried_events += batch.retried_events;
        self.failed_attempts += batch.failed_attempts;
    }
}

pub struct WorkerPool {
    config: RunnerConfig,
    context: Arc<RuntimeContext>,
    controller: Arc<Controller>,
    profiler: Arc<PhaseProfiler>,
    handles: Vec<(WorkerId, JoinHandle<Result<WorkerReport>>)>,
}

impl WorkerPool {
    /// Validate the configuration, build the controller and start the workers
    pub fn start(
        config: RunnerConfig,
        store: Arc<StateStore>,
        source: Arc<dyn EventSource>,
        logic: Arc<dyn BusinessLogic>,
    ) -> Result<Self> {
        config.validate()?;

        let context = Arc::new(RuntimeContext::new(&config));
        let controller = Arc::new(Controller::new(config.protocol, store));
        let profiler = Arc::new(PhaseProfiler::new(config.workers));
        let total = source.len();

        let mut handles = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let id = WorkerId(index);
            let seat = context.registry().register(id);
            let executor = BatchExecutor::new(
                index,
                config.function_id,
                config.combo_size,
                controller.clone(),
                source.clone(),
                logic.clone(),
            )
            .with_profiler(profiler.clone())
            .with_retry(config.retry);
            let worker_context = context.clone();

            let spawned = thread::Builder::new()
                .name(format!("txstream-worker-{}", index))
                .spawn(move || run_worker(seat, executor, &worker_context, total));

            match spawned {
                Ok(handle) => handles.push((id, handle)),
                Err(e) => {
                    context.registry().stop_all();
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(RunnerError::Spawn(e));
                }
            }
        }

        tracing::info!(
            "started {} workers ({}, combo size {}, {} events)",
            config.workers,
            controller.protocol_name(),
            config.combo_size,
            total
        );

        Ok(Self {
            config,
            context,
            controller,
            profiler,
            handles,
        })
    }

    /// Start a pool and wait for it to drain the event source
    pub fn run(
        config: RunnerConfig,
        store: Arc<StateStore>,
        source: Arc<dyn EventSource>,
        logic: Arc<dyn BusinessLogic>,
    ) -> Result<Vec<WorkerReport>> {
        Self::start(config, store, source, logic)?.join()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<RuntimeContext> {
        &self.context
    }

    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    pub fn profiler(&self) -> &Arc<PhaseProfiler> {
        &self.profiler
    }

    pub fn store(&self) -> &StateStore {
        self.controller.store()
    }

    /// Ask every worker to stop at its next safe point
    pub fn stop(&self) {
        self.context.registry().stop_all();
    }

    /// Stop workers one at a time; returns the ones that had to be abandoned
    pub fn sequential_stop(&self) -> Vec<WorkerId> {
        self.context.registry().sequential_stop_all()
    }

    /// Wait for every worker, bounded per worker by the join timeout
    pub fn wait_for_all(&self) -> Vec<(WorkerId, Result<()>)> {
        self.context.registry().wait_for_all()
    }

    /// Join every worker thread and collect their reports
    ///
    /// Abandoned workers are detached rather than joined. If any worker
    /// failed or panicked, the first such error is returned after all
    /// threads have been joined.
    pub fn join(self) -> Result<Vec<WorkerReport>> {
        let registry = self.context.registry();
        let mut reports = Vec::with_capacity(self.handles.len());
        let mut first_error = None;

        for (id, handle) in self.handles {
            if registry.is_abandoned(id).unwrap_or(false) {
                tracing::warn!("detaching abandoned {}", id);
                continue;
            }
            match handle.join() {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    first_error.get_or_insert(RunnerError::WorkerPanicked(id));
                }
            }
        }

        tracing::info!("joined {} workers", reports.len());
        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }
}

fn run_worker(
    seat: WorkerSeat,
    executor: BatchExecutor<Controller>,
    context: &RuntimeContext,
    total: u64,
) -> Result<WorkerReport> {
    seat.enter();
    let id = seat.id();
    let run = seat.run_flag().clone();
    let mut report = WorkerReport::new(id);

    while run.is_running() {
        let bid = context.allocator().allocate();
        if bid >= total {
            break;
        }

        let batch = executor.run_batch(bid, &run).map_err(|source| {
            tracing::error!("{} terminated on batch {}: {}", id, bid, source);
            RunnerError::WorkerFailed { worker: id, source }
        })?;
        report.absorb(&batch);
        if batch.stopped {
            break;
        }
    }

    report.stopped = !run.is_running();
    tracing::debug!(
        "{} done: {} batches, {} events, {} retried",
        id,
        report.batches,
        report.events,
        report.retried_events
    );
    Ok(report)
}
