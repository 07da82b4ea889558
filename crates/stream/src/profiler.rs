//! Phase-boundary profiling hooks
//!
//! The executor brackets each phase of event processing with `begin`/`end`
//! calls keyed by thread id. Profilers are purely observational: nothing they
//! return feeds back into control flow.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const PHASE_COUNT: usize = 6;

/// Measured phases of batch processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Per-batch setup before any transaction starts
    Prepare,
    /// The whole transactional section of a batch
    Transaction,
    /// First admission attempt for an event
    Admission,
    /// Business logic, including the write flush
    Compute,
    /// Retry loop after a refused admission
    Abort,
    /// Whole batch, end to end
    Total,
}

impl Phase {
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Prepare,
        Phase::Transaction,
        Phase::Admission,
        Phase::Compute,
        Phase::Abort,
        Phase::Total,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Transaction => "transaction",
            Phase::Admission => "admission",
            Phase::Compute => "compute",
            Phase::Abort => "abort",
            Phase::Total => "total",
        }
    }
}

/// Receiver of phase-boundary events
pub trait Profiler: Send + Sync {
    fn begin(&self, thread_id: usize, phase: Phase);
    fn end(&self, thread_id: usize, phase: Phase);
}

/// Profiler that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn begin(&self, _thread_id: usize, _phase: Phase) {}
    fn end(&self, _thread_id: usize, _phase: Phase) {}
}

#[derive(Debug, Default)]
struct ThreadPhases {
    started: Mutex<[Option<Instant>; PHASE_COUNT]>,
    nanos: [AtomicU64; PHASE_COUNT],
    counts: [AtomicU64; PHASE_COUNT],
}

/// Accumulating profiler with one slot per worker thread
///
/// Each `end` adds the time since the matching `begin` to the thread's total
/// for that phase. Calls for thread ids outside the configured range, and
/// `end` without a `begin`, are ignored.
#[derive(Debug)]
pub struct PhaseProfiler {
    threads: Vec<ThreadPhases>,
}

impl PhaseProfiler {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: (0..threads).map(|_| ThreadPhases::default()).collect(),
        }
    }

    /// Accumulated time spent in a phase by one thread
    pub fn elapsed(&self, thread_id: usize, phase: Phase) -> Duration {
        self.threads
            .get(thread_id)
            .map(|t| Duration::from_nanos(t.nanos[phase.index()].load(Ordering::Relaxed)))
            .unwrap_or_default()
    }

    /// Number of completed measurements of a phase by one thread
    pub fn count(&self, thread_id: usize, phase: Phase) -> u64 {
        self.threads
            .get(thread_id)
            .map(|t| t.counts[phase.index()].load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Accumulated time spent in a phase across all threads
    pub fn total(&self, phase: Phase) -> Duration {
        (0..self.threads.len())
            .map(|t| self.elapsed(t, phase))
            .sum()
    }

    /// Per-phase (elapsed, count) summary for one thread
    pub fn summary(&self, thread_id: usize) -> Vec<(Phase, Duration, u64)> {
        Phase::ALL
            .iter()
            .map(|&phase| {
                (
                    phase,
                    self.elapsed(thread_id, phase),
                    self.count(thread_id, phase),
                )
            })
            .collect()
    }
}

impl Profiler for PhaseProfiler {
    fn begin(&self, thread_id: usize, phase: Phase) {
        if let Some(thread) = self.threads.get(thread_id) {
            thread.started.lock()[phase.index()] = Some(Instant::now());
        }
    }

    fn end(&self, thread_id: usize, phase: Phase) {
        let Some(thread) = self.threads.get(thread_id) else {
            return;
        };
        let Some(started) = thread.started.lock()[phase.index()].take() else {
            return;
        };

        let nanos = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        thread.nanos[phase.index()].fetch_add(nanos, Ordering::Relaxed);
        thread.counts[phase.index()].fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_accumulates_per_thread() {
        let profiler = PhaseProfiler::new(2);

        profiler.begin(0, Phase::Compute);
        thread::sleep(Duration::from_millis(2));
        profiler.end(0, Phase::Compute);

        profiler.begin(0, Phase::Compute);
        profiler.end(0, Phase::Compute);

        assert_eq!(profiler.count(0, Phase::Compute), 2);
        assert!(profiler.elapsed(0, Phase::Compute) >= Duration::from_millis(2));
        assert_eq!(profiler.count(1, Phase::Compute), 0);
        assert_eq!(profiler.elapsed(1, Phase::Compute), Duration::ZERO);
        assert_eq!(profiler.total(Phase::Compute), profiler.elapsed(0, Phase::Compute));
    }

    #[test]
    fn test_unmatched_and_out_of_range_calls_are_ignored() {
        let profiler = PhaseProfiler::new(1);

        profiler.end(0, Phase::Abort);
        profiler.begin(7, Phase::Abort);
        profiler.end(7, Phase::Abort);

        assert_eq!(profiler.count(0, Phase::Abort), 0);
        assert_eq!(profiler.count(7, Phase::Abort), 0);
        assert_eq!(profiler.summary(0).len(), Phase::ALL.len());
    }
}
