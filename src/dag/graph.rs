// src/dag/graph.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::work::Work;
use crate::errors::{DagrunError, Result};

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Graph`], used to key per-graph run queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Handle to a node, stable for the lifetime of its graph.
///
/// Carries the id of the graph that issued it; other graphs reject it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    graph: GraphId,
    index: usize,
}

impl TaskId {
    pub fn index(self) -> usize {
        self.index
    }

    pub fn graph(self) -> GraphId {
        self.graph
    }
}

/// One unit of work plus its linkage inside the graph.
///
/// Per-run state (the "dependencies remaining" counter) is not stored here;
/// each topology keeps its own counters indexed by [`TaskId`], so a node
/// is immutable once the graph is shared.
#[derive(Debug)]
pub struct Node {
    name: String,
    work: Work,
    /// Direct successors, de-duplicated, in insertion order.
    successors: Vec<usize>,
    /// Number of direct predecessors.
    num_predecessors: usize,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    pub fn successors(&self) -> &[usize] {
        &self.successors
    }

    pub fn num_predecessors(&self) -> usize {
        self.num_predecessors
    }
}

/// In-memory DAG of task nodes.
///
/// Acyclicity is not enforced while edges are added; [`Graph::validate`] is
/// run on every submission and rejects cycles before a run is created.
#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    name: String,
    nodes: Vec<Node>,
    by_name: HashMap<String, usize>,
    num_edges: usize,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            nodes: Vec::new(),
            by_name: HashMap::new(),
            num_edges: 0,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    /// Add a node. Task names must be unique within a graph.
    pub fn add_task(&mut self, name: impl Into<String>, work: Work) -> Result<TaskId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(DagrunError::DuplicateTask(name));
        }

        let idx = self.nodes.len();
        debug!(graph = %self.name, task = %name, kind = work.kind(), "adding task");
        self.by_name.insert(name.clone(), idx);
        self.nodes.push(Node {
            name,
            work,
            successors: Vec::new(),
            num_predecessors: 0,
        });
        Ok(self.task_at(idx))
    }

    /// Declare that `from` must finish before `to` starts.
    ///
    /// Adding the same edge twice is a no-op. A self edge is rejected as a
    /// cycle immediately; longer cycles are caught by [`Graph::validate`].
    pub fn precede(&mut self, from: TaskId, to: TaskId) -> Result<()> {
        let from = self.check_id(from)?;
        let to = self.check_id(to)?;

        if from == to {
            return Err(DagrunError::DagCycle(format!(
                "task '{}' cannot precede itself",
                self.nodes[from].name
            )));
        }

        if self.nodes[from].successors.contains(&to) {
            return Ok(());
        }

        self.nodes[from].successors.push(to);
        self.nodes[to].num_predecessors += 1;
        self.num_edges += 1;
        Ok(())
    }

    pub fn task_id(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).map(|&idx| self.task_at(idx))
    }

    /// `None` if `id` belongs to another graph.
    pub fn node(&self, id: TaskId) -> Option<&Node> {
        self.check_id(id).ok().map(|idx| &self.nodes[idx])
    }

    pub(crate) fn node_at(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (TaskId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (self.task_at(i), n))
    }

    /// Immediate successors of a task.
    pub fn successors_of(&self, id: TaskId) -> Vec<TaskId> {
        self.node(id)
            .map(|n| n.successors.iter().map(|&s| self.task_at(s)).collect())
            .unwrap_or_default()
    }

    /// Immediate predecessors of a task. Linear in the size of the graph.
    pub fn predecessors_of(&self, id: TaskId) -> Vec<TaskId> {
        let Ok(idx) = self.check_id(id) else {
            return Vec::new();
        };
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.successors.contains(&idx))
            .map(|(i, _)| self.task_at(i))
            .collect()
    }

    /// Tasks with no predecessors; these seed every run.
    pub fn sources(&self) -> Vec<TaskId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.num_predecessors == 0)
            .map(|(i, _)| self.task_at(i))
            .collect()
    }

    /// Check the graph is a DAG and return a topological order.
    pub fn validate(&self) -> Result<Vec<TaskId>> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            for &succ in &node.successors {
                graph.add_edge(idx, succ, ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| self.task_at(idx)).collect()),
            Err(cycle) => Err(DagrunError::DagCycle(format!(
                "cycle detected in graph '{}' involving task '{}'",
                self.name,
                self.nodes[cycle.node_id()].name
            ))),
        }
    }

    fn task_at(&self, index: usize) -> TaskId {
        TaskId {
            graph: self.id,
            index,
        }
    }

    /// Node index of `id`, if it was issued by this graph.
    fn check_id(&self, id: TaskId) -> Result<usize> {
        if id.graph != self.id {
            return Err(DagrunError::TaskNotFound(format!(
                "task id {} belongs to graph {}, not '{}' ({})",
                id.index, id.graph, self.name, self.id
            )));
        }
        if id.index < self.nodes.len() {
            Ok(id.index)
        } else {
            Err(DagrunError::TaskNotFound(format!(
                "task id {} in graph '{}'",
                id.index, self.name
            )))
        }
    }
}
