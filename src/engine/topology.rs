// src/engine/topology.rs

//! One run of a graph, tracked to completion.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::dag::{Graph, GraphId};
use crate::engine::chain::RunChain;
use crate::errors::RunError;

/// Lifecycle of a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TopologyState {
    /// Queued behind another run of the same graph.
    Pending,
    /// Its nodes are being seeded or executed.
    Active,
    /// Every node finished.
    Completed,
    /// Dropped from the queue before it became active.
    Cancelled,
}

impl TopologyState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TopologyState::Pending,
            1 => TopologyState::Active,
            2 => TopologyState::Completed,
            _ => TopologyState::Cancelled,
        }
    }
}

pub(crate) struct Topology {
    id: u64,
    graph: Arc<Graph>,
    chain: Arc<RunChain>,
    /// Zero-based index of this run within its chain.
    run_index: usize,
    state: AtomicU8,
    /// Dependencies remaining per node, indexed like the graph's nodes.
    join_counters: Vec<AtomicUsize>,
    /// Nodes not yet finished in this run.
    unfinished: AtomicUsize,
    failure: Mutex<Option<RunError>>,
}

impl Topology {
    pub(crate) fn new(id: u64, graph: Arc<Graph>, chain: Arc<RunChain>, run_index: usize) -> Self {
        let join_counters = (0..graph.len()).map(|_| AtomicUsize::new(0)).collect();
        Self {
            id,
            graph,
            chain,
            run_index,
            state: AtomicU8::new(TopologyState::Pending as u8),
            join_counters,
            unfinished: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn shared_graph(&self) -> Arc<Graph> {
        Arc::clone(&self.graph)
    }

    pub(crate) fn graph_id(&self) -> GraphId {
        self.graph.id()
    }

    pub(crate) fn chain(&self) -> &Arc<RunChain> {
        &self.chain
    }

    pub(crate) fn run_index(&self) -> usize {
        self.run_index
    }

    pub(crate) fn state(&self) -> TopologyState {
        TopologyState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Pending → Active. Resets every node's counter to its predecessor count
    /// and returns the source nodes to seed.
    ///
    /// Returns `None` if the topology was not pending (already activated by
    /// another thread, or cancelled).
    pub(crate) fn activate(&self) -> Option<Vec<usize>> {
        self.transition(TopologyState::Pending, TopologyState::Active)
            .then(|| {
                let mut sources = Vec::new();
                for (idx, counter) in self.join_counters.iter().enumerate() {
                    let preds = self.graph.node_at(idx).num_predecessors();
                    counter.store(preds, Ordering::Relaxed);
                    if preds == 0 {
                        sources.push(idx);
                    }
                }
                // Published to workers by the queue push that hands out the sources.
                self.unfinished.store(self.graph.len(), Ordering::Relaxed);
                sources
            })
    }

    /// Pending → Cancelled.
    pub(crate) fn cancel(&self) -> bool {
        self.transition(TopologyState::Pending, TopologyState::Cancelled)
    }

    pub(crate) fn mark_completed(&self) {
        self.state
            .store(TopologyState::Completed as u8, Ordering::Release);
    }

    /// One predecessor of `node` finished. Returns `true` exactly once per
    /// run: for the call that takes the counter to zero.
    pub(crate) fn release_dependency(&self, node: usize) -> bool {
        self.join_counters[node].fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// One node of this run finished. Returns `true` exactly once per run:
    /// for the last node, whose caller must complete the topology.
    pub(crate) fn finish_node(&self) -> bool {
        self.unfinished.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Keep `err` unless an earlier failure is already recorded.
    pub(crate) fn record_failure(&self, err: RunError) -> bool {
        let mut slot = self.failure.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(err);
        true
    }

    pub(crate) fn take_failure(&self) -> Option<RunError> {
        self.failure.lock().take()
    }

    fn transition(&self, from: TopologyState, to: TopologyState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topology")
            .field("id", &self.id)
            .field("graph", &self.graph.name())
            .field("run_index", &self.run_index)
            .field("state", &self.state())
            .field("unfinished", &self.unfinished.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
