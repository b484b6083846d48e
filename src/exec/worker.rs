// src/exec/worker.rs

//! Worker thread loop and the work-stealing protocol.
//!
//! Each worker owns a LIFO deque. The owner pushes and pops at one end;
//! thieves steal from the other end in FIFO order. A worker looks for work
//! in this order:
//!
//! 1. its own deque (most recently readied successor first)
//! 2. the executor's injection queue (a batch is moved into the local deque)
//! 3. the other workers' deques, starting at a random victim and making a
//!    full pass over all peers
//!
//! Steps 2 and 3 are repeated `steal_rounds` times before the worker parks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_deque::{Steal, Worker as Deque};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, error, trace, warn};

use crate::dag::TaskOutcome;
use crate::engine::Topology;
use crate::errors::{RunError, panic_message};
use crate::exec::executor::Shared;

/// A ready node of a specific run.
pub(crate) struct Job {
    pub(crate) topology: Arc<Topology>,
    pub(crate) node: usize,
}

pub(crate) struct WorkerLoop {
    index: usize,
    local: Deque<Job>,
    shared: Arc<Shared>,
    rng: StdRng,
}

impl WorkerLoop {
    pub(crate) fn new(index: usize, local: Deque<Job>, shared: Arc<Shared>, rng: StdRng) -> Self {
        Self {
            index,
            local,
            shared,
            rng,
        }
    }

    pub(crate) fn run(mut self) {
        debug!(worker = self.index, "worker started");
        let shared = Arc::clone(&self.shared);

        loop {
            if let Some(job) = self.find_job() {
                self.execute(job);
                continue;
            }

            let notifier = shared.notifier();
            let ticket = notifier.prepare_park();

            // Re-scan after announcing ourselves; anything pushed from here
            // on bumps the epoch and makes `park` return.
            if let Some(job) = self.find_job_once() {
                notifier.cancel_park();
                self.execute(job);
                continue;
            }

            if shared.is_shutdown() {
                notifier.cancel_park();
                break;
            }

            trace!(worker = self.index, "parking");
            notifier.park(ticket);
        }

        debug!(worker = self.index, "worker stopped");
    }

    fn find_job(&mut self) -> Option<Job> {
        if let Some(job) = self.local.pop() {
            return Some(job);
        }
        for round in 0..self.shared.config().steal_rounds {
            if let Some(job) = self.steal_once() {
                return Some(job);
            }
            if round + 1 < self.shared.config().steal_rounds {
                std::thread::yield_now();
            }
        }
        None
    }

    fn find_job_once(&mut self) -> Option<Job> {
        self.local.pop().or_else(|| self.steal_once())
    }

    fn steal_once(&mut self) -> Option<Job> {
        self.steal_from_injector().or_else(|| self.steal_from_peers())
    }

    fn steal_from_injector(&self) -> Option<Job> {
        loop {
            match self.shared.injector().steal_batch_and_pop(&self.local) {
                Steal::Success(job) => return Some(job),
                Steal::Empty => return None,
                Steal::Retry => continue,
            }
        }
    }

    fn steal_from_peers(&mut self) -> Option<Job> {
        let stealers = self.shared.stealers();
        let n = stealers.len();
        if n < 2 {
            return None;
        }

        let start = self.rng.random_range(0..n);
        for offset in 0..n {
            let victim = (start + offset) % n;
            if victim == self.index {
                continue;
            }
            loop {
                match stealers[victim].steal() {
                    Steal::Success(job) => {
                        trace!(worker = self.index, victim, "stole task");
                        return Some(job);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
        None
    }

    /// Run one node, then resolve its successors.
    fn execute(&self, job: Job) {
        let Job { topology, node } = job;
        let task = topology.graph().node_at(node);

        trace!(
            worker = self.index,
            task = %task.name(),
            topology = topology.id(),
            "executing task"
        );

        let failure = match panic::catch_unwind(AssertUnwindSafe(|| task.work().invoke(task.name()))) {
            Ok(TaskOutcome::Success) => None,
            Ok(TaskOutcome::Failed(message)) => Some(RunError::TaskFailed {
                task: task.name().to_string(),
                message,
            }),
            Err(payload) => Some(RunError::TaskPanicked {
                task: task.name().to_string(),
                message: panic_message(&*payload),
            }),
        };

        if let Some(err) = failure {
            match &err {
                RunError::TaskPanicked { .. } => {
                    error!(worker = self.index, topology = topology.id(), error = %err, "task panicked")
                }
                _ => warn!(worker = self.index, topology = topology.id(), error = %err, "task failed"),
            }
            topology.record_failure(err);
        }

        // Successors whose last dependency this was are pushed to the owner
        // end, so the next `pop` continues on this thread.
        let ready: Vec<Job> = task
            .successors()
            .iter()
            .copied()
            .filter(|&succ| topology.release_dependency(succ))
            .map(|succ| Job {
                topology: Arc::clone(&topology),
                node: succ,
            })
            .collect();

        if !ready.is_empty() {
            self.shared.schedule(ready, Some(&self.local));
        }

        if topology.finish_node() {
            self.shared.on_topology_finished(topology, Some(&self.local));
        }
    }
}
