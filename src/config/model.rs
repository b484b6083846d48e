// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::executor::ExecutorConfig;
use crate::dag::{Taskflow, Work};
use crate::errors::Result;

/// Graph file as read from TOML, before validation.
///
/// ```toml
/// [executor]
/// workers = 4
///
/// [task.build]
/// cmd = "cargo build"
///
/// [task.test]
/// cmd = "cargo test"
/// after = ["build"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawGraphFile {
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated graph file: task names are unique, every `after` entry names
/// a task, and the dependency graph is acyclic.
///
/// Only obtainable through `TryFrom<RawGraphFile>`.
#[derive(Debug, Clone)]
pub struct GraphFile {
    pub executor: ExecutorConfig,
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskConfig {
    /// Shell command line.
    pub cmd: String,

    /// Tasks that must complete before this one starts.
    #[serde(default)]
    pub after: Vec<String>,
}

impl GraphFile {
    pub(crate) fn new_unchecked(executor: ExecutorConfig, task: BTreeMap<String, TaskConfig>) -> Self {
        Self { executor, task }
    }

    /// Tasks without `after` entries.
    pub fn roots(&self) -> Vec<&str> {
        self.task
            .iter()
            .filter(|(_, t)| t.after.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Build a [`Taskflow`] of command nodes, one per task.
    pub fn build_taskflow(&self, name: impl Into<String>) -> Result<Taskflow> {
        let mut flow = Taskflow::new(name);

        for (task_name, task) in &self.task {
            flow.emplace_work(task_name.clone(), Work::command(task.cmd.clone()))?;
        }
        for (task_name, task) in &self.task {
            let to = flow.task(task_name)?;
            for dep in &task.after {
                let from = flow.task(dep)?;
                flow.precede(from, [to])?;
            }
        }

        Ok(flow)
    }
}
