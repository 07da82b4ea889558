//! Per-worker batch execution loop
//!
//! For each event of an assigned combo batch, in ascending id order:
//! build a fresh context, ask the controller for admission, spin (with the
//! configured backoff) until admitted, run business logic once, flush its
//! writes and commit.

use crate::access::TxnAccess;
use crate::controller::ConcurrencyController;
use crate::error::{Error, Result};
use crate::logic::BusinessLogic;
use crate::profiler::{NoopProfiler, Phase, Profiler};
use crate::retry::RetryPolicy;
use crate::source::EventSource;
use std::sync::Arc;
use std::thread;
use txstream_common::{BatchId, Event, EventId, FunctionId, RunFlag, TransactionContext};

/// Outcome of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// First event id of the batch
    pub bid: BatchId,
    /// Events committed
    pub events: u64,
    /// Events that needed more than one admission attempt
    pub retried_events: u64,
    /// Refused admission attempts across the batch
    pub failed_attempts: u64,
    /// The run flag was cleared before the batch finished
    pub stopped: bool,
}

impl BatchReport {
    fn new(bid: BatchId) -> Self {
        Self {
            bid,
            ..Default::default()
        }
    }

    fn record(&mut self, failed_attempts: u64) {
        self.events += 1;
        self.failed_attempts += failed_attempts;
        if failed_attempts > 0 {
            self.retried_events += 1;
        }
    }
}

/// Drives one worker thread's transactions over combo batches
pub struct BatchExecutor<C: ConcurrencyController> {
    thread_id: usize,
    function_id: FunctionId,
    combo_size: u64,
    controller: Arc<C>,
    source: Arc<dyn EventSource>,
    logic: Arc<dyn BusinessLogic>,
    profiler: Arc<dyn Profiler>,
    retry: RetryPolicy,
}

impl<C: ConcurrencyController> BatchExecutor<C> {
    /// Create an executor that spins on refused admissions and records no profile
    ///
    /// A `combo_size` of zero is treated as one.
    pub fn new(
        thread_id: usize,
        function_id: FunctionId,
        combo_size: u64,
        controller: Arc<C>,
        source: Arc<dyn EventSource>,
        logic: Arc<dyn BusinessLogic>,
    ) -> Self {
        Self {
            thread_id,
            function_id,
            combo_size: combo_size.max(1),
            controller,
            source,
            logic,
            profiler: Arc::new(NoopProfiler),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_profiler(mut self, profiler: Arc<dyn Profiler>) -> Self {
        self.profiler = profiler;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn thread_id(&self) -> usize {
        self.thread_id
    }

    pub fn combo_size(&self) -> u64 {
        self.combo_size
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    /// Execute the batch `[bid, bid + combo_size)`, clamped to the source
    ///
    /// `run` is checked between events. When it is cleared, or when an event
    /// faults, the remaining events of the batch are retired through the
    /// controller without running business logic.
    pub fn run_batch(&self, bid: BatchId, run: &RunFlag) -> Result<BatchReport> {
        let t = self.thread_id;
        self.profiler.begin(t, Phase::Total);

        self.profiler.begin(t, Phase::Prepare);
        let end = bid.saturating_add(self.combo_size).min(self.source.len());
        let mut report = BatchReport::new(bid);
        self.profiler.end(t, Phase::Prepare);

        self.profiler.begin(t, Phase::Transaction);
        let result = self.process_range(bid, end, run, &mut report);
        self.profiler.end(t, Phase::Transaction);

        self.profiler.end(t, Phase::Total);

        match &result {
            Ok(()) => tracing::debug!(
                "thread {} finished batch {} ({} events, {} retried, stopped: {})",
                t,
                bid,
                report.events,
                report.retried_events,
                report.stopped
            ),
            Err(e) => tracing::debug!("thread {} aborted batch {}: {}", t, bid, e),
        }

        result.map(|()| report)
    }

    fn process_range(
        &self,
        start: EventId,
        end: EventId,
        run: &RunFlag,
        report: &mut BatchReport,
    ) -> Result<()> {
        let mut unfinished = Unfinished {
            executor: self,
            in_flight: None,
            next: start,
            end,
        };

        while unfinished.next < end {
            if !run.is_running() {
                report.stopped = true;
                unfinished.release();
                return Ok(());
            }

            let id = unfinished.next;
            let ctx = unfinished.begin();
            let outcome = match self.source.get(id) {
                Some(event) => self.execute_event(ctx, event),
                None => Err(Error::EventNotFound(id)),
            };

            match outcome {
                Ok(failed_attempts) => {
                    unfinished.committed();
                    report.record(failed_attempts);
                }
                Err(e) => {
                    unfinished.release();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Run one event to commit; returns the number of refused admissions
    fn execute_event(&self, ctx: &mut TransactionContext, event: &Event) -> Result<u64> {
        let t = self.thread_id;

        self.profiler.begin(t, Phase::Admission);
        let admitted = self.controller.try_admit(ctx, event.access, &event.keys);
        self.profiler.end(t, Phase::Admission);

        let mut failed_attempts = 0;
        if !admitted {
            ctx.mark_retry();
            failed_attempts += 1;

            self.profiler.begin(t, Phase::Abort);
            let mut backoff = self.retry.backoff();
            loop {
                backoff.wait();
                if self.controller.try_admit(ctx, event.access, &event.keys) {
                    break;
                }
                failed_attempts += 1;
            }
            self.profiler.end(t, Phase::Abort);

            tracing::trace!(
                "thread {} admitted event {} after {} refusals",
                t,
                event.id,
                failed_attempts
            );
        }

        self.profiler.begin(t, Phase::Compute);
        let mut access = TxnAccess::new(self.controller.as_ref(), ctx);
        let applied = if event.is_read() {
            self.logic.apply_read(event, &mut access)
        } else {
            self.logic.apply_write(event, &mut access)
        };
        let applied = applied.map(|()| access.flush());
        self.profiler.end(t, Phase::Compute);

        applied?;
        self.controller.commit(ctx);
        Ok(failed_attempts)
    }

    /// Abort never-started events so ordered controllers can move past them
    fn retire(&self, start: EventId, end: EventId) {
        for id in start..end {
            let mut ctx = TransactionContext::new(self.thread_id, self.function_id, id);
            self.controller.abort(&mut ctx);
        }
    }
}

/// Events of a batch that have not reached commit
///
/// Releasing aborts the in-flight event and retires the rest of the range.
/// Dropping an unreleased range does the same, so a business handler that
/// panics cannot leave ordered controllers waiting on ids nobody finishes.
struct Unfinished<'a, C: ConcurrencyController> {
    executor: &'a BatchExecutor<C>,
    in_flight: Option<TransactionContext>,
    next: EventId,
    end: EventId,
}

impl<C: ConcurrencyController> Unfinished<'_, C> {
    /// Start the next event; it stays in flight until `committed`
    fn begin(&mut self) -> &mut TransactionContext {
        let ctx = TransactionContext::new(
            self.executor.thread_id,
            self.executor.function_id,
            self.next,
        );
        self.next += 1;
        self.in_flight.insert(ctx)
    }

    fn committed(&mut self) {
        self.in_flight = None;
    }

    fn release(&mut self) {
        if let Some(mut ctx) = self.in_flight.take() {
            self.executor.controller.abort(&mut ctx);
        }
        self.executor.retire(self.next, self.end);
        self.next = self.end;
    }
}

impl<C: ConcurrencyController> Drop for Unfinished<'_, C> {
    fn drop(&mut self) {
        if self.in_flight.is_none() && self.next >= self.end {
            return;
        }
        if thread::panicking() {
            tracing::warn!(
                "thread {} unwinding with events [{}, {}) unfinished, releasing them",
                self.executor.thread_id,
                self.in_flight.as_ref().map_or(self.next, |ctx| ctx.batch_id),
                self.end
            );
        }
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::PutGetLogic;
    use crate::profiler::PhaseProfiler;
    use crate::source::VecEventSource;
    use crate::test_utils::GateController;
    use txstream_common::Value;

    fn scenario_events() -> Vec<Event> {
        vec![
            Event::write(0, vec![1], vec![Value::Integer(10)]),
            Event::read(1, vec![1]),
            Event::write(2, vec![1], vec![Value::Integer(20)]),
            Event::read(3, vec![1]),
        ]
    }

    fn executor(
        controller: Arc<GateController>,
        events: Vec<Event>,
        logic: Arc<PutGetLogic>,
        combo_size: u64,
    ) -> BatchExecutor<GateController> {
        BatchExecutor::new(
            0,
            0,
            combo_size,
            controller,
            Arc::new(VecEventSource::new(events)),
            logic,
        )
    }

    #[test]
    fn test_sequential_batch() {
        let controller = Arc::new(GateController::new());
        let logic = Arc::new(PutGetLogic::new());
        let exec = executor(controller.clone(), scenario_events(), logic.clone(), 4);

        let report = exec.run_batch(0, &RunFlag::new()).unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(report.retried_events, 0);
        assert!(!report.stopped);

        assert_eq!(controller.store().get(1), Some(Value::Integer(20)));
        assert_eq!(logic.observed(1), Some(vec![Some(Value::Integer(10))]));
        assert_eq!(logic.observed(3), Some(vec![Some(Value::Integer(20))]));
        assert_eq!(controller.committed(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_retry_runs_logic_once() {
        let controller = Arc::new(GateController::new());
        let logic = Arc::new(PutGetLogic::new());
        let profiler = Arc::new(PhaseProfiler::new(1));
        let exec = executor(controller.clone(), scenario_events(), logic.clone(), 4)
            .with_profiler(profiler.clone());

        controller.refuse_next(5);
        let report = exec.run_batch(0, &RunFlag::new()).unwrap();

        assert_eq!(report.events, 4);
        assert_eq!(report.retried_events, 1);
        assert_eq!(report.failed_attempts, 5);
        for id in 0..4 {
            assert_eq!(logic.invocations(id), 1);
        }
        assert_eq!(profiler.count(0, Phase::Abort), 1);
        assert_eq!(profiler.count(0, Phase::Admission), 4);
        assert_eq!(profiler.count(0, Phase::Total), 1);
    }

    #[test]
    fn test_no_retry_leaves_abort_phase_empty() {
        let controller = Arc::new(GateController::new());
        let profiler = Arc::new(PhaseProfiler::new(1));
        let exec = executor(
            controller,
            scenario_events(),
            Arc::new(PutGetLogic::new()),
            4,
        )
        .with_profiler(profiler.clone());

        exec.run_batch(0, &RunFlag::new()).unwrap();
        assert_eq!(profiler.count(0, Phase::Abort), 0);
        assert_eq!(profiler.elapsed(0, Phase::Abort), std::time::Duration::ZERO);
        assert_eq!(profiler.count(0, Phase::Compute), 4);
    }

    #[test]
    fn test_batch_is_clamped_to_source() {
        let controller = Arc::new(GateController::new());
        let exec = executor(
            controller.clone(),
            scenario_events(),
            Arc::new(PutGetLogic::new()),
            3,
        );

        let report = exec.run_batch(3, &RunFlag::new()).unwrap();
        assert_eq!(report.bid, 3);
        assert_eq!(report.events, 1);

        let empty = exec.run_batch(8, &RunFlag::new()).unwrap();
        assert_eq!(empty.events, 0);
    }

    #[test]
    fn test_fault_aborts_and_retires_rest_of_batch() {
        let controller = Arc::new(GateController::new());
        let logic = Arc::new(PutGetLogic::new());
        // Event 1 reads a key nobody wrote
        let events = vec![
            Event::write(0, vec![1], vec![Value::Integer(10)]),
            Event::read(1, vec![2]),
            Event::write(2, vec![1], vec![Value::Integer(20)]),
            Event::read(3, vec![1]),
        ];
        let exec = executor(controller.clone(), events, logic.clone(), 4);

        let result = exec.run_batch(0, &RunFlag::new());
        assert_eq!(result, Err(Error::MissingKey(2)));

        assert_eq!(controller.committed(), vec![0]);
        assert_eq!(controller.aborted(), vec![1, 2, 3]);
        assert_eq!(logic.invocations(2), 0);
        assert_eq!(controller.store().get(1), Some(Value::Integer(10)));
    }

    #[test]
    fn test_failed_write_leaves_value_untouched() {
        let controller = Arc::new(GateController::with_values(vec![(1, Value::Integer(1))]));
        // Second key has no value to pair with
        let events = vec![Event::write(0, vec![1, 2], vec![Value::Integer(99)])];
        let exec = executor(controller.clone(), events, Arc::new(PutGetLogic::new()), 1);

        assert!(matches!(
            exec.run_batch(0, &RunFlag::new()),
            Err(Error::Logic(_))
        ));
        assert_eq!(controller.store().get(1), Some(Value::Integer(1)));
        assert_eq!(controller.aborted(), vec![0]);
    }

    #[test]
    fn test_missing_event_is_reported() {
        let controller = Arc::new(GateController::new());
        let events = vec![Event::read(0, vec![1]), Event::read(7, vec![1])];
        let exec = executor(
            controller.clone(),
            events,
            Arc::new(PutGetLogic::new().with_lenient_reads(true)),
            2,
        );

        assert_eq!(
            exec.run_batch(0, &RunFlag::new()),
            Err(Error::EventNotFound(1))
        );
        assert_eq!(controller.committed(), vec![0]);
        assert_eq!(controller.aborted(), vec![1]);
    }

    #[test]
    fn test_stopped_flag_retires_batch() {
        let controller = Arc::new(GateController::new());
        let logic = Arc::new(PutGetLogic::new());
        let exec = executor(controller.clone(), scenario_events(), logic.clone(), 4);

        let run = RunFlag::new();
        run.stop();
        let report = exec.run_batch(0, &run).unwrap();

        assert!(report.stopped);
        assert_eq!(report.events, 0);
        assert_eq!(controller.aborted(), vec![0, 1, 2, 3]);
        assert!(logic.all_invocations().is_empty());
    }

    /// Handler that panics on every read
    struct PanicOnRead;

    impl BusinessLogic for PanicOnRead {
        fn apply_read(&self, event: &Event, _txn: &mut TxnAccess<'_>) -> Result<()> {
            panic!("read handler failed on event {}", event.id);
        }

        fn apply_write(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()> {
            PutGetLogic::new().apply_write(event, txn)
        }
    }

    #[test]
    fn test_panicking_handler_releases_rest_of_batch() {
        let controller = Arc::new(GateController::new());
        let exec = BatchExecutor::new(
            0,
            0,
            4,
            controller.clone(),
            Arc::new(VecEventSource::new(scenario_events())),
            Arc::new(PanicOnRead),
        );

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            exec.run_batch(0, &RunFlag::new())
        }));
        assert!(outcome.is_err());

        // Event 1 was in flight; 2 and 3 never started
        assert_eq!(controller.committed(), vec![0]);
        assert_eq!(controller.aborted(), vec![1, 2, 3]);
        assert_eq!(controller.store().get(1), Some(Value::Integer(10)));
    }
}
