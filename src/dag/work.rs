// src/dag/work.rs

//! Task payloads.
//!
//! The scheduler never looks inside a payload: it only calls
//! [`Work::invoke`] and reads the returned [`TaskOutcome`]. The set of
//! payload kinds is closed so a graph stays `Send + Sync` and cheap to clone.

use std::fmt;
use std::sync::Arc;

use crate::exec::command::{CommandSpec, run_command};

/// Outcome of invoking a payload once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

type StaticFn = dyn Fn() + Send + Sync;
type FallibleFn = dyn Fn() -> anyhow::Result<()> + Send + Sync;

/// The work attached to a task node.
#[derive(Clone)]
pub enum Work {
    /// Infallible closure. A panic is still caught and reported by the worker.
    Static(Arc<StaticFn>),
    /// Closure whose `Err` is reported as a task failure.
    Fallible(Arc<FallibleFn>),
    /// Shell command; a non-zero exit status is a task failure.
    Command(CommandSpec),
    /// No-op node, useful as a join point.
    Placeholder,
}

impl Work {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Work::Static(Arc::new(f))
    }

    pub fn from_fallible<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Work::Fallible(Arc::new(f))
    }

    pub fn command(cmd: impl Into<String>) -> Self {
        Work::Command(CommandSpec::new(cmd))
    }

    /// Run the payload once on the calling thread.
    ///
    /// `task` is only used for log fields.
    pub fn invoke(&self, task: &str) -> TaskOutcome {
        match self {
            Work::Static(f) => {
                f();
                TaskOutcome::Success
            }
            Work::Fallible(f) => match f() {
                Ok(()) => TaskOutcome::Success,
                Err(err) => TaskOutcome::Failed(format!("{err:#}")),
            },
            Work::Command(spec) => run_command(task, spec),
            Work::Placeholder => TaskOutcome::Success,
        }
    }

    /// Short label for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Work::Static(_) => "static",
            Work::Fallible(_) => "fallible",
            Work::Command(_) => "command",
            Work::Placeholder => "placeholder",
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Work::Command(spec) => f.debug_tuple("Command").field(&spec.cmd).finish(),
            other => f.write_str(other.kind()),
        }
    }
}
