// src/engine/queue.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::dag::GraphId;
use crate::engine::chain::RunChain;
use crate::engine::topology::Topology;

/// Per-graph FIFO of runs.
///
/// Semantics:
/// - Each graph that has at least one pending or active run owns one queue;
///   the queue disappears when its last run completes.
/// - The *front* run of a queue is the only one that may be active. Runs
///   behind it stay pending until the front completes.
/// - `run_n` enqueues all its runs in one call, so no other request for the
///   same graph can interleave with them.
/// - `run_until` keeps its chain at the front: the follow-up run replaces the
///   completed one instead of going to the back.
#[derive(Debug, Default)]
pub(crate) struct TopologyQueue {
    queues: Mutex<HashMap<GraphId, VecDeque<Arc<Topology>>>>,
}

/// Result of [`TopologyQueue::complete_front`].
pub(crate) struct FrontCompletion {
    /// Pending runs removed because their chain halted.
    pub dropped: Vec<Arc<Topology>>,
    /// Whether the graph still has queued runs (the new front must be started).
    pub has_front: bool,
    /// Whether the finished run's chain still has runs in the queue.
    pub chain_queued: bool,
}

/// Result of [`TopologyQueue::cancel_pending`].
pub(crate) struct PendingCancellation {
    pub cancelled: Vec<Arc<Topology>>,
    /// Chains left with no run in any queue. Chains that still have an
    /// active run are resolved when that run completes.
    pub orphaned: Vec<Arc<RunChain>>,
}

impl TopologyQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append runs for `graph`.
    ///
    /// Returns `true` if nothing was queued for the graph before, in which
    /// case the caller is responsible for starting the new front.
    pub(crate) fn enqueue(&self, graph: GraphId, runs: Vec<Arc<Topology>>) -> bool {
        let mut queues = self.queues.lock();
        let queue = queues.entry(graph).or_default();
        let was_idle = queue.is_empty();
        let added = runs.len();
        queue.extend(runs);
        debug!(graph = %graph, added, queued = queue.len(), was_idle, "enqueued runs");
        was_idle
    }

    /// The run at the front of `graph`'s queue, if any.
    pub(crate) fn front(&self, graph: GraphId) -> Option<Arc<Topology>> {
        self.queues
            .lock()
            .get(&graph)
            .and_then(|q| q.front())
            .cloned()
    }

    /// Remove the completed front run of its graph's queue.
    ///
    /// - `next` (a follow-up `run_until` run) is pushed to the front.
    /// - With `halt`, every queued run of the finished run's chain is removed
    ///   and returned in [`FrontCompletion::dropped`].
    pub(crate) fn complete_front(
        &self,
        finished: &Topology,
        next: Option<Arc<Topology>>,
        halt: bool,
    ) -> FrontCompletion {
        let graph = finished.graph_id();
        let chain = finished.chain().id();
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(&graph) else {
            warn!(graph = %graph, topology = finished.id(), "completed run has no queue");
            return FrontCompletion {
                dropped: next.into_iter().collect(),
                has_front: false,
                chain_queued: false,
            };
        };

        match queue.iter().position(|t| t.id() == finished.id()) {
            Some(0) => {
                queue.pop_front();
            }
            Some(pos) => {
                warn!(graph = %graph, topology = finished.id(), pos, "completed run was not at the front");
                queue.remove(pos);
            }
            None => {
                warn!(graph = %graph, topology = finished.id(), "completed run missing from queue");
            }
        }

        let mut dropped = Vec::new();
        if halt {
            let (halted, kept): (VecDeque<_>, VecDeque<_>) = queue
                .drain(..)
                .partition(|t| t.chain().id() == chain && t.cancel());
            *queue = kept;
            dropped.extend(halted);
            debug!(graph = %graph, chain, dropped = dropped.len(), "dropped queued runs of halted chain");
        }

        if let Some(next) = next {
            queue.push_front(next);
        }

        let chain_queued = queue.iter().any(|t| t.chain().id() == chain);
        let has_front = !queue.is_empty();
        if !has_front {
            queues.remove(&graph);
        }

        FrontCompletion {
            dropped,
            has_front,
            chain_queued,
        }
    }

    /// Cancel every run that has not started yet, across all graphs.
    ///
    /// Active runs stay in place and complete normally.
    pub(crate) fn cancel_pending(&self) -> PendingCancellation {
        let mut queues = self.queues.lock();
        let mut cancelled = Vec::new();
        let mut orphaned: Vec<Arc<RunChain>> = Vec::new();

        for queue in queues.values_mut() {
            let (gone, kept): (VecDeque<_>, VecDeque<_>) =
                queue.drain(..).partition(|t| t.cancel());
            for topology in &gone {
                let chain = topology.chain();
                let live = kept.iter().any(|t| t.chain().id() == chain.id());
                if !live && !orphaned.iter().any(|c| c.id() == chain.id()) {
                    orphaned.push(Arc::clone(chain));
                }
            }
            *queue = kept;
            cancelled.extend(gone);
        }
        queues.retain(|_, q| !q.is_empty());

        debug!(
            cancelled = cancelled.len(),
            orphaned = orphaned.len(),
            "cancelled pending runs"
        );
        PendingCancellation {
            cancelled,
            orphaned,
        }
    }

    /// Total number of queued runs (pending and active) over all graphs.
    pub(crate) fn len(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }

    /// Number of queued runs (pending and active) for one graph.
    pub(crate) fn queued_for(&self, graph: GraphId) -> usize {
        self.queues.lock().get(&graph).map_or(0, VecDeque::len)
    }
}
