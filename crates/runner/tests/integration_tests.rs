//! Integration tests for the worker pool

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use txstream_common::{Event, Value};
use txstream_runner::{Protocol, RunnerConfig, RunnerError, WorkerPool};
use txstream_store::StateStore;
use txstream_stream::{
    BusinessLogic, Error, Phase, PutGetLogic, Result, TxnAccess, VecEventSource, WriteMode,
};

/// Counter workload: every write adds 1 to two keys
fn counter_events(count: u64, key_space: u64) -> Vec<Event> {
    (0..count)
        .map(|i| {
            Event::write(
                i,
                vec![i % key_space, (i / key_space + 1) * 31 % key_space],
                vec![Value::Integer(1), Value::Integer(1)],
            )
        })
        .collect()
}

fn accumulate_logic() -> Arc<PutGetLogic> {
    Arc::new(PutGetLogic::new().with_mode(WriteMode::Accumulate))
}

/// Logic that sleeps before delegating, to keep workers busy
struct SlowLogic {
    inner: PutGetLogic,
    delay: Duration,
    threads: Mutex<BTreeSet<String>>,
}

impl SlowLogic {
    fn new(delay: Duration) -> Self {
        Self {
            inner: PutGetLogic::new().with_mode(WriteMode::Accumulate),
            delay,
            threads: Mutex::new(BTreeSet::new()),
        }
    }

    fn note_thread(&self) {
        if let Some(name) = thread::current().name() {
            self.threads.lock().insert(name.to_string());
        }
        thread::sleep(self.delay);
    }
}

impl BusinessLogic for SlowLogic {
    fn apply_read(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()> {
        self.note_thread();
        self.inner.apply_read(event, txn)
    }

    fn apply_write(&self, event: &Event, txn: &mut TxnAccess<'_>) -> Result<()> {
        self.note_thread();
        self.inner.apply_write(event, txn)
    }
}

fn total_of(store: &StateStore) -> i64 {
    store
        .snapshot()
        .values()
        .filter_map(|v| v.as_i64())
        .sum()
}

#[test]
fn test_pool_drains_source_under_every_protocol() {
    for protocol in Protocol::ALL {
        let config = RunnerConfig::new(protocol)
            .with_workers(4)
            .with_combo_size(5);
        let store = Arc::new(StateStore::new());
        let logic = accumulate_logic();
        let source = Arc::new(VecEventSource::new(counter_events(500, 16)));

        let reports =
            WorkerPool::run(config, store.clone(), source, logic.clone()).unwrap();

        assert_eq!(reports.len(), 4, "{}", protocol);
        assert_eq!(reports.iter().map(|r| r.events).sum::<u64>(), 500);
        assert!(reports.iter().all(|r| !r.stopped));

        let invocations = logic.all_invocations();
        assert_eq!(invocations.len(), 500);
        assert!(invocations.values().all(|&n| n == 1), "{}", protocol);

        // Two increments per event, none lost
        assert_eq!(total_of(&store), 1000, "{}", protocol);
    }
}

#[test]
fn test_storage_fault_terminates_worker() {
    let config = RunnerConfig::new(Protocol::LockBased).with_combo_size(2);
    let source = Arc::new(VecEventSource::new(vec![
        Event::write(0, vec![1], vec![Value::Integer(1)]),
        Event::read(1, vec![99]),
        Event::write(2, vec![1], vec![Value::Integer(2)]),
    ]));

    let err = WorkerPool::run(
        config,
        Arc::new(StateStore::new()),
        source,
        Arc::new(PutGetLogic::new()),
    )
    .unwrap_err();

    match err {
        RunnerError::WorkerFailed { worker, source } => {
            assert_eq!(worker.index(), 0);
            assert_eq!(source, Error::MissingKey(99));
        }
        other => panic!("expected worker failure, got {:?}", other),
    }
}

#[test]
fn test_stop_leaves_no_stranded_batches() {
    let config = RunnerConfig::new(Protocol::WatermarkOrdered)
        .with_workers(3)
        .with_combo_size(4);
    let logic = Arc::new(SlowLogic::new(Duration::from_millis(2)));
    let source = Arc::new(VecEventSource::new(counter_events(10_000, 8)));

    let pool = WorkerPool::start(config, Arc::new(StateStore::new()), source, logic.clone())
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    pool.stop();

    assert!(pool.wait_for_all().iter().all(|(_, r)| r.is_ok()));

    let processed = total_of(pool.store()) / 2;
    let reports = pool.join().unwrap();
    assert!(reports.iter().all(|r| r.stopped));

    let events: u64 = reports.iter().map(|r| r.events).sum();
    assert!(events < 10_000);
    assert_eq!(events as i64, processed);
    assert!(logic.inner.all_invocations().values().all(|&n| n == 1));
}

#[test]
fn test_workers_run_on_named_threads_with_profiling() {
    let config = RunnerConfig::new(Protocol::OptimisticRetry)
        .with_workers(2)
        .with_combo_size(1);
    let logic = Arc::new(SlowLogic::new(Duration::from_millis(1)));
    let source = Arc::new(VecEventSource::new(counter_events(40, 4)));

    let pool = WorkerPool::start(config, Arc::new(StateStore::new()), source, logic.clone())
        .unwrap();
    let profiler = pool.profiler().clone();
    let reports = pool.join().unwrap();

    let names = logic.threads.lock().clone();
    assert!(!names.is_empty());
    assert!(names.iter().all(|n| n.starts_with("txstream-worker-")));

    let compute: u64 = (0..2).map(|t| profiler.count(t, Phase::Compute)).sum();
    assert_eq!(compute, 40);
    let batches: u64 = reports.iter().map(|r| r.batches).sum();
    let totals: u64 = (0..2).map(|t| profiler.count(t, Phase::Total)).sum();
    assert_eq!(totals, batches);
}

#[test]
fn test_sequential_stop_from_outside() {
    let config = RunnerConfig::new(Protocol::LockBased)
        .with_workers(2)
        .with_stop_polling(Duration::from_millis(5), 200);
    let logic = Arc::new(SlowLogic::new(Duration::from_millis(1)));
    let source = Arc::new(VecEventSource::new(counter_events(5_000, 8)));

    let pool = WorkerPool::start(config, Arc::new(StateStore::new()), source, logic).unwrap();
    thread::sleep(Duration::from_millis(20));

    assert!(pool.sequential_stop().is_empty());
    let reports = pool.join().unwrap();
    assert_eq!(reports.len(), 2);
}

#[test]
fn test_invalid_config_is_rejected() {
    let result = WorkerPool::start(
        RunnerConfig::default().with_workers(0),
        Arc::new(StateStore::new()),
        Arc::new(VecEventSource::new(Vec::new())),
        Arc::new(PutGetLogic::new()),
    );
    assert!(matches!(result, Err(RunnerError::InvalidConfig(_))));
}

#[test]
fn test_empty_source() {
    let reports = WorkerPool::run(
        RunnerConfig::default().with_workers(3),
        Arc::new(StateStore::new()),
        Arc::new(VecEventSource::new(Vec::new())),
        Arc::new(PutGetLogic::new()),
    )
    .unwrap();

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.batches == 0 && r.events == 0));
}
