// src/types.rs

use std::str::FromStr;
use serde::Deserialize;

/// What a chain of runs (`run_n` / `run_until`) does after one of its runs
/// reports a task failure.
///
/// - `Continue`: keep going; later runs still execute and the handle reports
///   the first failure once the chain ends (default behaviour).
/// - `Halt`: no further run of the chain starts; runs already queued for it
///   are dropped and the handle resolves with the failure right away.
///
/// A run that is already executing is never interrupted either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Continue,
    Halt,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Continue
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(FailurePolicy::Continue),
            "halt" => Ok(FailurePolicy::Halt),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"continue\" or \"halt\")"
            )),
        }
    }
}

/// How an executor treats outstanding runs when it shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    /// Wait for every pending and active run to complete.
    Drain,
    /// Cancel runs that have not started yet, stop `run_until` chains from
    /// advancing, and wait only for the runs that are already executing.
    CancelPending,
}

impl Default for ShutdownMode {
    fn default() -> Self {
        ShutdownMode::Drain
    }
}

impl FromStr for ShutdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "drain" => Ok(ShutdownMode::Drain),
            "cancel_pending" | "cancel" => Ok(ShutdownMode::CancelPending),
            other => Err(format!(
                "invalid shutdown_mode: {other} (expected \"drain\" or \"cancel_pending\")"
            )),
        }
    }
}
