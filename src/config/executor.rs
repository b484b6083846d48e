// src/config/executor.rs

use serde::Deserialize;

use crate::errors::{DagrunError, Result};
use crate::types::{FailurePolicy, ShutdownMode};

/// Environment variable overriding [`ExecutorConfig::workers`].
pub const WORKERS_ENV: &str = "DAGRUN_WORKERS";
/// Environment variable overriding [`ExecutorConfig::failure_policy`].
pub const FAILURE_POLICY_ENV: &str = "DAGRUN_FAILURE_POLICY";

/// Executor settings, as read from the `[executor]` section of a graph file.
///
/// ```toml
/// [executor]
/// workers = 4
/// steal_rounds = 2
/// failure_policy = "halt"
/// shutdown_mode = "cancel_pending"
/// thread_name = "dagrun-worker"
/// seed = 42
/// ```
///
/// Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of worker threads. Defaults to the number of logical CPUs.
    pub workers: usize,

    /// Passes over the injector and the peers' deques before a worker parks.
    pub steal_rounds: usize,

    /// What a `run_n` / `run_until` chain does after a failed run.
    pub failure_policy: FailurePolicy,

    /// What happens to outstanding runs when the executor is dropped.
    pub shutdown_mode: ShutdownMode,

    /// Worker threads are named `{thread_name}-{index}`.
    pub thread_name: String,

    /// Seed for victim selection. `None` seeds every worker from the OS.
    pub seed: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            steal_rounds: 2,
            failure_policy: FailurePolicy::default(),
            shutdown_mode: ShutdownMode::default(),
            thread_name: "dagrun-worker".to_string(),
            seed: None,
        }
    }
}

impl ExecutorConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Defaults overlaid with `DAGRUN_WORKERS` and `DAGRUN_FAILURE_POLICY`.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Apply the environment overrides on top of `self`.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var(WORKERS_ENV) {
            self.workers = raw.trim().parse().map_err(|_| {
                DagrunError::ConfigError(format!("{WORKERS_ENV} must be a number (got '{raw}')"))
            })?;
        }
        if let Ok(raw) = std::env::var(FAILURE_POLICY_ENV) {
            self.failure_policy = raw.parse().map_err(DagrunError::ConfigError)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(DagrunError::ConfigError(
                "[executor].workers must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.steal_rounds == 0 {
            return Err(DagrunError::ConfigError(
                "[executor].steal_rounds must be >= 1 (got 0)".to_string(),
            ));
        }
        if self.thread_name.trim().is_empty() {
            return Err(DagrunError::ConfigError(
                "[executor].thread_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
