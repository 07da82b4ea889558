//! Micro-benchmark over every concurrency control protocol
//!
//! Generates a mixed read/write workload over a small key space and runs it
//! through a worker pool once per protocol, reporting throughput, retries
//! and time spent in each phase.

use std::sync::Arc;
use std::time::Instant;
use txstream_common::{Event, Value};
use txstream_runner::{Protocol, RunnerConfig, WorkerPool};
use txstream_store::StateStore;
use txstream_stream::{ConcurrencyController, Phase, PutGetLogic, VecEventSource, WriteMode};

const NUM_EVENTS: u64 = 200_000;
const KEY_SPACE: u64 = 1_024;
const KEYS_PER_EVENT: u64 = 4;
const WRITE_PERCENT: u64 = 50;
const WORKERS: usize = 4;
const COMBO_SIZE: u64 = 8;

fn workload() -> Vec<Event> {
    (0..NUM_EVENTS)
        .map(|i| {
            // Cheap deterministic scatter over the key space
            let keys: Vec<u64> = (0..KEYS_PER_EVENT)
                .map(|k| (i.wrapping_mul(2_654_435_761) + k * 97) % KEY_SPACE)
                .collect();

            if i % 100 < WRITE_PERCENT {
                let values: Vec<Value> = keys.iter().map(|_| Value::Integer(1)).collect();
                Event::write(i, keys, values)
            } else {
                Event::read(i, keys)
            }
        })
        .collect()
}

fn main() {
    println!("=== Transactional Stream Micro-Benchmark ===\n");
    println!(
        "{} events, {} keys, {} keys/event, {}% writes, {} workers, combo size {}\n",
        NUM_EVENTS, KEY_SPACE, KEYS_PER_EVENT, WRITE_PERCENT, WORKERS, COMBO_SIZE
    );

    let events = workload();
    let initial: Vec<(u64, Value)> = (0..KEY_SPACE).map(|k| (k, Value::Integer(0))).collect();

    for protocol in Protocol::ALL {
        let config = RunnerConfig::new(protocol)
            .with_workers(WORKERS)
            .with_combo_size(COMBO_SIZE);
        let store = Arc::new(StateStore::with_values(initial.clone()));
        let source = Arc::new(VecEventSource::new(events.clone()));
        let logic = Arc::new(PutGetLogic::new().with_mode(WriteMode::Accumulate));

        let start_time = Instant::now();
        let pool = match WorkerPool::start(config, store, source, logic) {
            Ok(pool) => pool,
            Err(e) => {
                eprintln!("Error starting {} pool: {}", protocol, e);
                continue;
            }
        };
        let profiler = pool.profiler().clone();
        let controller = pool.controller().clone();

        let reports = match pool.join() {
            Ok(reports) => reports,
            Err(e) => {
                eprintln!("Error running {}: {}", protocol, e);
                continue;
            }
        };
        let total_seconds = start_time.elapsed().as_secs_f64();

        let committed: u64 = reports.iter().map(|r| r.events).sum();
        let retried: u64 = reports.iter().map(|r| r.retried_events).sum();
        let attempts: u64 = reports.iter().map(|r| r.failed_attempts).sum();
        let written: i64 = controller
            .store()
            .snapshot()
            .values()
            .filter_map(|v| v.as_i64())
            .sum();

        println!("--- {} ---", protocol);
        println!("Committed:         {}", committed);
        println!("Total time:        {:.2} seconds", total_seconds);
        println!(
            "Throughput:        {:.0} events/second",
            committed as f64 / total_seconds
        );
        println!("Retried events:    {} ({} refused admissions)", retried, attempts);
        println!("Increments stored: {}", written);
        for phase in [Phase::Admission, Phase::Compute, Phase::Abort] {
            println!(
                "{:<18} {:.3} ms",
                format!("{} time:", phase.as_str()),
                profiler.total(phase).as_secs_f64() * 1000.0
            );
        }
        println!();
    }

    println!("✓ Benchmark complete!");
}
