// src/dag/taskflow.rs

//! Owning handle for a graph that can be submitted to an executor.

use std::sync::Arc;

use crate::dag::graph::{Graph, GraphId, TaskId};
use crate::dag::work::Work;
use crate::errors::{DagrunError, Result};

/// A named task graph.
///
/// The graph is shared with every run created from it. While any such run is
/// pending or active, structural changes fail with
/// [`DagrunError::GraphBusy`] instead of racing with the workers.
#[derive(Debug)]
pub struct Taskflow {
    graph: Arc<Graph>,
}

impl Taskflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            graph: Arc::new(Graph::new(name)),
        }
    }

    pub fn name(&self) -> &str {
        self.graph.name()
    }

    pub fn id(&self) -> GraphId {
        self.graph.id()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Exclusive access to the graph, only granted when no run references it.
    pub fn graph_mut(&mut self) -> Result<&mut Graph> {
        let name = self.graph.name().to_string();
        Arc::get_mut(&mut self.graph).ok_or(DagrunError::GraphBusy(name))
    }

    /// Whether a pending or active run still holds this graph.
    pub fn is_running(&self) -> bool {
        Arc::strong_count(&self.graph) > 1
    }

    pub fn emplace<F>(&mut self, name: impl Into<String>, f: F) -> Result<TaskId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.emplace_work(name, Work::from_fn(f))
    }

    pub fn emplace_fallible<F>(&mut self, name: impl Into<String>, f: F) -> Result<TaskId>
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.emplace_work(name, Work::from_fallible(f))
    }

    pub fn placeholder(&mut self, name: impl Into<String>) -> Result<TaskId> {
        self.emplace_work(name, Work::Placeholder)
    }

    pub fn emplace_work(&mut self, name: impl Into<String>, work: Work) -> Result<TaskId> {
        self.graph_mut()?.add_task(name, work)
    }

    /// `from` runs before every task in `to`.
    pub fn precede(&mut self, from: TaskId, to: impl IntoIterator<Item = TaskId>) -> Result<()> {
        let graph = self.graph_mut()?;
        for t in to {
            graph.precede(from, t)?;
        }
        Ok(())
    }

    /// `task` runs after every task in `after`.
    pub fn succeed(&mut self, task: TaskId, after: impl IntoIterator<Item = TaskId>) -> Result<()> {
        let graph = self.graph_mut()?;
        for a in after {
            graph.precede(a, task)?;
        }
        Ok(())
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Result<TaskId> {
        self.graph
            .task_id(name)
            .ok_or_else(|| DagrunError::TaskNotFound(name.to_string()))
    }

    /// Shared reference handed to each run.
    pub(crate) fn shared_graph(&self) -> Arc<Graph> {
        Arc::clone(&self.graph)
    }
}
