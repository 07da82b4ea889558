//! Backoff between admission attempts
//!
//! The default policy busy-spins, which keeps admission latency minimal at
//! the cost of CPU under contention. Sleeping policies park the thread, so a
//! lifecycle `stop` (which unparks the worker) cuts the wait short. No policy
//! limits the number of attempts: the event is retried until admitted.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// Cap on the exponent used by exponential backoff
const MAX_BACKOFF_SHIFT: u32 = 20;

/// Retry policy for refused admissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry immediately with a spin-loop hint
    #[default]
    Spin,
    /// Sleep a fixed delay between attempts (unit: microseconds)
    FixedDelay { delay_us: u64 },
    /// Double the delay after every attempt, capped (unit: microseconds)
    Exponential { base_us: u64, max_us: u64 },
}

impl RetryPolicy {
    /// Start a fresh backoff sequence for one event
    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            attempt: 0,
        }
    }
}

/// Backoff state for the retries of a single event
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl Backoff {
    /// Delay before the next attempt; `None` means spin
    pub fn next_delay(&mut self) -> Option<Duration> {
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        match self.policy {
            RetryPolicy::Spin => None,
            RetryPolicy::FixedDelay { delay_us } => Some(Duration::from_micros(delay_us)),
            RetryPolicy::Exponential { base_us, max_us } => {
                let factor = 1u64 << attempt.min(MAX_BACKOFF_SHIFT);
                Some(Duration::from_micros(
                    base_us.saturating_mul(factor).min(max_us),
                ))
            }
        }
    }

    /// Wait before the next attempt
    pub fn wait(&mut self) {
        match self.next_delay() {
            None => std::hint::spin_loop(),
            Some(delay) if delay.is_zero() => thread::yield_now(),
            Some(delay) => thread::park_timeout(delay),
        }
    }

    /// Number of waits performed so far
    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}
