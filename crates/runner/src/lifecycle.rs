//! Worker thread registry and lifecycle control
//!
//! Every worker owns a [`WorkerSeat`] obtained from the registry. The seat
//! carries the worker's [`RunFlag`] and marks the worker finished when it is
//! dropped, including on panic. Stopping is cooperative: `stop` clears the
//! flag, unparks the thread and interrupts any `join`/`wait_for_all` the
//! worker is blocked in; the worker leaves at its next check (between
//! events). Nothing here ever kills a thread; a worker that does not
//! stop within the polling budget of `sequential_stop_all` is abandoned
//! (left detached) instead.

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};
use txstream_common::RunFlag;

/// Worker identifier; also the thread id used in contexts and profiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl WorkerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct WorkerSlot {
    run: RunFlag,
    thread: Mutex<Option<Thread>>,
    finished: Mutex<bool>,
    finished_cv: Condvar,
    abandoned: AtomicBool,
    /// Pending interrupt, consumed by the next wait that observes it
    interrupted: AtomicBool,
}

impl WorkerSlot {
    fn stop(&self) {
        self.run.stop();
        self.interrupted.store(true, Ordering::Release);
        if let Some(thread) = self.thread.lock().as_ref() {
            thread.unpark();
        }
    }

    fn finish(&self) {
        *self.finished.lock() = true;
        self.finished_cv.notify_all();
    }

    fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }

    fn is_finished(&self) -> bool {
        *self.finished.lock()
    }

    fn is_current(&self) -> bool {
        let current = thread::current().id();
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|t| t.id() == current)
    }
}

/// A worker's membership in the registry
///
/// Dropping the seat marks the worker finished and wakes its joiners.
#[derive(Debug)]
pub struct WorkerSeat {
    id: WorkerId,
    slot: Arc<WorkerSlot>,
}

impl WorkerSeat {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn run_flag(&self) -> &RunFlag {
        &self.slot.run
    }

    /// Bind the seat to the calling thread
    ///
    /// Must be called first thing on the worker thread so that `stop` can
    /// unpark it and "the caller" can be recognized by the stop operations.
    pub fn enter(&self) {
        *self.slot.thread.lock() = Some(thread::current());
    }
}

impl Drop for WorkerSeat {
    fn drop(&mut self) {
        self.slot.finish();
    }
}

/// Registry of the worker threads of one runtime
pub struct WorkerRegistry {
    workers: RwLock<BTreeMap<WorkerId, Arc<WorkerSlot>>>,
    interrupts: AtomicU64,
    join_timeout: Duration,
    stop_poll_interval: Duration,
    stop_attempts: u32,
}

impl WorkerRegistry {
    pub fn new(config: &RunnerConfig) -> Self {
        Self {
            workers: RwLock::new(BTreeMap::new()),
            interrupts: AtomicU64::new(0),
            join_timeout: config.join_timeout(),
            stop_poll_interval: config.stop_poll_interval(),
            stop_attempts: config.stop_attempts,
        }
    }

    /// Register a worker in the running state
    ///
    /// Registering an id again replaces the earlier registration.
    pub fn register(&self, id: WorkerId) -> WorkerSeat {
        let slot = Arc::new(WorkerSlot::default());
        self.workers.write().insert(id, slot.clone());
        WorkerSeat { id, slot }
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// The worker running on the calling thread, if any
    pub fn current_worker(&self) -> Option<WorkerId> {
        self.workers
            .read()
            .iter()
            .find(|(_, slot)| slot.is_current())
            .map(|(id, _)| *id)
    }

    pub fn run_flag(&self, id: WorkerId) -> Result<RunFlag> {
        Ok(self.slot(id)?.run.clone())
    }

    pub fn is_running(&self, id: WorkerId) -> Result<bool> {
        Ok(self.slot(id)?.run.is_running())
    }

    pub fn is_finished(&self, id: WorkerId) -> Result<bool> {
        Ok(self.slot(id)?.is_finished())
    }

    /// Whether `sequential_stop_all` gave up on this worker
    pub fn is_abandoned(&self, id: WorkerId) -> Result<bool> {
        Ok(self.slot(id)?.abandoned.load(Ordering::Acquire))
    }

    /// Ask one worker to stop at its next safe point
    pub fn stop(&self, id: WorkerId) -> Result<()> {
        self.slot(id)?.stop();
        self.wake_waiters();
        tracing::debug!("requested stop of {}", id);
        Ok(())
    }

    /// Stop the calling worker; returns its id, or `None` when the caller is
    /// not a registered worker
    pub fn force_exit(&self) -> Option<WorkerId> {
        let id = self.current_worker()?;
        if let Some(slot) = self.workers.read().get(&id) {
            slot.stop();
        }
        tracing::debug!("{} exiting", id);
        Some(id)
    }

    /// Stop every worker, the calling worker last
    pub fn stop_all(&self) {
        let me = self.current_worker();
        for (id, slot) in self.snapshot() {
            if Some(id) != me {
                slot.stop();
            }
        }
        self.wake_waiters();
        if let Some(me) = me {
            self.force_exit();
            tracing::debug!("{} stopped itself after stopping all others", me);
        }
        tracing::info!("stop requested for all workers");
    }

    /// Stop the other workers one at a time, then the calling worker
    ///
    /// Each worker is polled every `stop_poll_interval` until it finishes. A
    /// worker still running after `stop_attempts` polls is abandoned and the
    /// next one is stopped. Returns the abandoned workers.
    pub fn sequential_stop_all(&self) -> Vec<WorkerId> {
        let me = self.current_worker();
        let mut abandoned = Vec::new();

        for (id, slot) in self.snapshot() {
            if Some(id) == me {
                continue;
            }
            slot.stop();
            self.wake_waiters();

            let mut polls = 0;
            while !slot.is_finished() {
                if polls >= self.stop_attempts {
                    tracing::warn!(
                        "{} still running after {} stop polls, abandoning it",
                        id,
                        polls
                    );
                    slot.abandoned.store(true, Ordering::Release);
                    abandoned.push(id);
                    break;
                }
                thread::sleep(self.stop_poll_interval);
                polls += 1;
            }
        }

        if me.is_some() {
            self.force_exit();
        }
        abandoned
    }

    /// Block until the worker finishes
    pub fn join(&self, id: WorkerId) -> Result<()> {
        let generation = self.interrupts.load(Ordering::Acquire);
        self.wait(id, generation, None)
    }

    /// Block until the worker finishes or `timeout` elapses
    pub fn join_timeout(&self, id: WorkerId, timeout: Duration) -> Result<()> {
        let generation = self.interrupts.load(Ordering::Acquire);
        self.wait(id, generation, Some(timeout))
    }

    /// Wait for every worker except the caller, each bounded by the
    /// configured join timeout
    ///
    /// Returns one outcome per worker, in worker order. Once the wait is
    /// interrupted every remaining outcome is `Interrupted`.
    pub fn wait_for_all(&self) -> Vec<(WorkerId, Result<()>)> {
        let generation = self.interrupts.load(Ordering::Acquire);
        let me = self.current_worker();
        let mut interrupted = false;

        self.snapshot()
            .into_iter()
            .filter(|(id, _)| Some(*id) != me)
            .map(|(id, _)| {
                if interrupted {
                    return (id, Err(RunnerError::Interrupted));
                }
                let outcome = self.wait(id, generation, Some(self.join_timeout));
                interrupted = matches!(outcome, Err(RunnerError::Interrupted));
                (id, outcome)
            })
            .collect()
    }

    /// Wake every blocked `join`/`wait_for_all` with `Interrupted`
    pub fn interrupt_waiters(&self) {
        self.interrupts.fetch_add(1, Ordering::AcqRel);
        self.wake_waiters();
        tracing::debug!("interrupted lifecycle waiters");
    }

    /// Notify every finish condvar so blocked waiters recheck their state
    fn wake_waiters(&self) {
        for slot in self.workers.read().values() {
            let _finished = slot.finished.lock();
            slot.finished_cv.notify_all();
        }
    }

    fn wait(&self, id: WorkerId, generation: u64, timeout: Option<Duration>) -> Result<()> {
        let slot = self.slot(id)?;
        if slot.is_current() {
            return Err(RunnerError::SelfJoin(id));
        }
        // A worker stopped while (or before) waiting gets `Interrupted`
        let caller = self.caller_slot();

        let deadline = timeout.map(|t| Instant::now() + t);
        let mut finished = slot.finished.lock();
        loop {
            if *finished {
                return Ok(());
            }
            if self.interrupts.load(Ordering::Acquire) != generation
                || caller.as_ref().is_some_and(|c| c.take_interrupt())
            {
                return Err(RunnerError::Interrupted);
            }
            match (deadline, timeout) {
                (Some(deadline), Some(timeout)) => {
                    if Instant::now() >= deadline {
                        return Err(RunnerError::JoinTimeout {
                            worker: id,
                            timeout,
                        });
                    }
                    slot.finished_cv.wait_until(&mut finished, deadline);
                }
                _ => slot.finished_cv.wait(&mut finished),
            }
        }
    }

    fn slot(&self, id: WorkerId) -> Result<Arc<WorkerSlot>> {
        self.workers
            .read()
            .get(&id)
            .cloned()
            .ok_or(RunnerError::UnknownWorker(id))
    }

    fn caller_slot(&self) -> Option<Arc<WorkerSlot>> {
        self.workers
            .read()
            .values()
            .find(|slot| slot.is_current())
            .cloned()
    }

    fn snapshot(&self) -> Vec<(WorkerId, Arc<WorkerSlot>)> {
        self.workers
            .read()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect()
    }
}
