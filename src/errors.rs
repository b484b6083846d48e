// src/errors.rs

//! Crate-wide error types.
//!
//! - [`DagrunError`] covers everything that can go wrong *before* or *around*
//!   a run: graph construction, submission, configuration, IO.
//! - [`RunError`] is what a [`RunHandle`](crate::engine::RunHandle) resolves
//!   with when a run does not complete cleanly. It is `Clone` so that every
//!   clone of a handle can observe the same outcome.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    #[error("Graph '{0}' is referenced by a pending or active run")]
    GraphBusy(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure observed while executing a run (or chain of runs).
///
/// Only the first failure of a chain is reported; later ones are logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    #[error("task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("task '{task}' panicked: {message}")]
    TaskPanicked { task: String, message: String },

    #[error("run callback panicked: {0}")]
    CallbackPanicked(String),

    #[error("run cancelled after {completed} completed run(s)")]
    Cancelled { completed: usize },
}

impl RunError {
    /// Name of the task that caused the failure, if a task did.
    pub fn task(&self) -> Option<&str> {
        match self {
            RunError::TaskFailed { task, .. } | RunError::TaskPanicked { task, .. } => Some(task),
            RunError::CallbackPanicked(_) | RunError::Cancelled { .. } => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagrunError>;

/// Render a panic payload caught by `catch_unwind` as a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
