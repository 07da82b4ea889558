//! Runner configuration

use crate::error::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use txstream_common::FunctionId;
use txstream_concurrency::Protocol;
use txstream_stream::RetryPolicy;

/// Configuration for a worker pool
///
/// Read once when the pool starts; the pool keeps its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Events per combo batch handed to a worker at a time
    #[serde(default = "default_combo_size")]
    pub combo_size: u64,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Operator id stamped on every transaction
    #[serde(default)]
    pub function_id: FunctionId,

    /// Concurrency control protocol
    #[serde(default)]
    pub protocol: Protocol,

    /// Backoff between refused admissions
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Per-worker bound for `wait_for_all` (unit: milliseconds)
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    /// Poll interval of `sequential_stop_all` (unit: milliseconds)
    #[serde(default = "default_stop_poll_interval_ms")]
    pub stop_poll_interval_ms: u64,

    /// Polls before `sequential_stop_all` abandons a worker
    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,
}

fn default_combo_size() -> u64 {
    4
}
fn default_workers() -> usize {
    1
}
fn default_join_timeout_ms() -> u64 {
    10_000
}
fn default_stop_poll_interval_ms() -> u64 {
    10
}
fn default_stop_attempts() -> u32 {
    100
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            combo_size: default_combo_size(),
            workers: default_workers(),
            function_id: 0,
            protocol: Protocol::default(),
            retry: RetryPolicy::default(),
            join_timeout_ms: default_join_timeout_ms(),
            stop_poll_interval_ms: default_stop_poll_interval_ms(),
            stop_attempts: default_stop_attempts(),
        }
    }
}

impl RunnerConfig {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }

    pub fn with_combo_size(mut self, combo_size: u64) -> Self {
        self.combo_size = combo_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_function_id(mut self, function_id: FunctionId) -> Self {
        self.function_id = function_id;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the poll interval and poll budget of `sequential_stop_all`
    pub fn with_stop_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.stop_poll_interval_ms = duration_ms(interval);
        self.stop_attempts = attempts;
        self
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms)
    }

    /// Check the configuration before any thread is started
    pub fn validate(&self) -> Result<()> {
        if self.combo_size == 0 {
            return Err(RunnerError::InvalidConfig(
                "combo_size must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(RunnerError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.stop_attempts == 0 {
            return Err(RunnerError::InvalidConfig(
                "stop_attempts must be at least 1".to_string(),
            ));
        }
        match self.retry {
            RetryPolicy::Exponential { base_us, max_us } if base_us > max_us => {
                Err(RunnerError::InvalidConfig(format!(
                    "exponential backoff base {}us exceeds max {}us",
                    base_us, max_us
                )))
            }
            _ => Ok(()),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
