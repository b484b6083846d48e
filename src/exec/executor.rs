// src/exec/executor.rs

//! The executor: a fixed pool of worker threads plus the shared scheduling
//! state they cooperate through.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_deque::{Injector, Stealer, Worker as Deque};
use parking_lot::{Condvar, Mutex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info};

use crate::config::ExecutorConfig;
use crate::dag::{Graph, GraphId};
use crate::engine::{ChainStep, RunChain, Topology, TopologyQueue};
use crate::errors::Result;
use crate::exec::notifier::Notifier;
use crate::exec::worker::{Job, WorkerLoop};
use crate::types::ShutdownMode;

/// Work-stealing executor for task graphs.
///
/// Workers are spawned in [`Executor::new`] and live until the executor is
/// shut down (explicitly with [`Executor::shutdown`], or on drop with the
/// configured [`ShutdownMode`]).
///
/// Runs of the *same* graph execute one at a time in submission order; runs
/// of different graphs execute concurrently.
pub struct Executor {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        config.validate()?;

        let locals: Vec<Deque<Job>> = (0..config.workers).map(|_| Deque::new_lifo()).collect();
        let stealers = locals.iter().map(Deque::stealer).collect();
        let shared = Arc::new(Shared::new(config, stealers));

        let mut executor = Self {
            shared: Arc::clone(&shared),
            workers: Vec::with_capacity(locals.len()),
        };

        for (index, local) in locals.into_iter().enumerate() {
            let rng = match shared.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
                None => StdRng::from_os_rng(),
            };
            let worker = WorkerLoop::new(index, local, Arc::clone(&shared), rng);

            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", shared.config.thread_name))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => executor.workers.push(handle),
                Err(err) => {
                    error!(index, error = %err, "failed to spawn worker thread");
                    // Nothing was submitted yet, so this only joins the
                    // workers started so far.
                    executor.stop(ShutdownMode::CancelPending);
                    return Err(err.into());
                }
            }
        }

        info!(
            workers = executor.workers.len(),
            steal_rounds = shared.config.steal_rounds,
            failure_policy = ?shared.config.failure_policy,
            "executor started"
        );
        Ok(executor)
    }

    /// Executor with `workers` threads and default settings otherwise.
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(ExecutorConfig::with_workers(workers))
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    pub fn num_workers(&self) -> usize {
        self.shared.stealers.len()
    }

    /// Runs that are pending or active, over all graphs.
    pub fn num_topologies(&self) -> usize {
        self.shared.inflight.get()
    }

    /// Runs queued (pending or active) for one graph.
    pub fn queued_runs(&self, graph: GraphId) -> usize {
        self.shared.registry.queued_for(graph)
    }

    /// Block until every run known to the executor has completed.
    ///
    /// Must not be called from inside a task, callback or predicate: the
    /// calling worker would wait for itself.
    pub fn wait_for_all(&self) {
        self.shared.inflight.wait_idle();
    }

    /// Stop the executor and join all worker threads.
    pub fn shutdown(mut self, mode: ShutdownMode) {
        self.stop(mode);
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    fn stop(&mut self, mode: ShutdownMode) {
        if self.workers.is_empty() {
            return;
        }

        info!(?mode, pending = self.shared.inflight.get(), "shutting down executor");

        if mode == ShutdownMode::CancelPending {
            self.shared.cancel_pending();
        }
        self.shared.inflight.wait_idle();

        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.notifier.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("executor stopped");
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        let mode = self.shared.config.shutdown_mode;
        self.stop(mode);
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("workers", &self.workers.len())
            .field("topologies", &self.shared.inflight.get())
            .field("queued", &self.shared.registry.len())
            .finish_non_exhaustive()
    }
}

/// Count of runs not yet completed, with a wait-until-zero.
#[derive(Debug, Default)]
struct Inflight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Inflight {
    fn add(&self, n: usize) {
        *self.count.lock() += n;
    }

    fn sub(&self, n: usize) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(n);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

/// State shared between the executor handle and its workers.
pub(crate) struct Shared {
    config: ExecutorConfig,
    injector: Injector<Job>,
    stealers: Vec<Stealer<Job>>,
    notifier: Notifier,
    registry: TopologyQueue,
    inflight: Inflight,
    shutdown: AtomicBool,
    cancelling: AtomicBool,
    next_topology: AtomicU64,
    next_chain: AtomicU64,
}

impl Shared {
    fn new(config: ExecutorConfig, stealers: Vec<Stealer<Job>>) -> Self {
        Self {
            config,
            injector: Injector::new(),
            stealers,
            notifier: Notifier::new(),
            registry: TopologyQueue::new(),
            inflight: Inflight::default(),
            shutdown: AtomicBool::new(false),
            cancelling: AtomicBool::new(false),
            next_topology: AtomicU64::new(1),
            next_chain: AtomicU64::new(1),
        }
    }

    pub(crate) fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub(crate) fn injector(&self) -> &Injector<Job> {
        &self.injector
    }

    pub(crate) fn stealers(&self) -> &[Stealer<Job>] {
        &self.stealers
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub(crate) fn next_chain_id(&self) -> u64 {
        self.next_chain.fetch_add(1, Ordering::Relaxed)
    }

    fn next_topology_id(&self) -> u64 {
        self.next_topology.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue the initial runs of `chain` and start the first one if the
    /// graph was idle.
    pub(crate) fn submit(&self, graph: Arc<Graph>, chain: Arc<RunChain>) {
        let count = chain.plan().initial_runs();
        if count == 0 {
            chain.resolve();
            return;
        }

        let graph_id = graph.id();
        let runs: Vec<Arc<Topology>> = (0..count)
            .map(|run_index| {
                Arc::new(Topology::new(
                    self.next_topology_id(),
                    Arc::clone(&graph),
                    Arc::clone(&chain),
                    run_index,
                ))
            })
            .collect();
        drop(graph);

        self.inflight.add(count);
        if self.registry.enqueue(graph_id, runs) {
            self.advance(graph_id, None);
        }
    }

    /// Push ready jobs and wake workers for them.
    ///
    /// With `local` (called from a worker) the jobs go to that worker's own
    /// deque and it keeps one for itself; otherwise they go to the injector.
    pub(crate) fn schedule(&self, jobs: Vec<Job>, local: Option<&Deque<Job>>) {
        let n = jobs.len();
        match local {
            Some(deque) => {
                for job in jobs {
                    deque.push(job);
                }
                self.notifier.notify(n.saturating_sub(1));
            }
            None => {
                for job in jobs {
                    self.injector.push(job);
                }
                self.notifier.notify(n);
            }
        }
    }

    /// Called by the worker whose node was the last of `topology`.
    pub(crate) fn on_topology_finished(&self, topology: Arc<Topology>, local: Option<&Deque<Job>>) {
        let graph = topology.graph_id();
        if self.settle(topology) {
            self.advance(graph, local);
        }
    }

    /// Activate the front run of `graph` and seed its sources.
    ///
    /// Runs over empty graphs complete on the spot; the loop then moves on
    /// to the next run instead of recursing.
    fn advance(&self, graph: GraphId, local: Option<&Deque<Job>>) {
        while let Some(topology) = self.registry.front(graph) {
            let Some(sources) = topology.activate() else {
                return;
            };

            debug!(
                graph = %graph,
                topology = topology.id(),
                run = topology.run_index(),
                sources = sources.len(),
                "run activated"
            );

            if sources.is_empty() {
                if !self.settle(topology) {
                    return;
                }
                continue;
            }

            let jobs = sources
                .into_iter()
                .map(|node| Job {
                    topology: Arc::clone(&topology),
                    node,
                })
                .collect();
            self.schedule(jobs, local);
            return;
        }
    }

    /// Completion work for a finished run: callback, chain decision, result
    /// handle, queue bookkeeping.
    ///
    /// Returns `true` if the graph has another run queued that must be
    /// started.
    fn settle(&self, topology: Arc<Topology>) -> bool {
        let graph = topology.graph_id();
        let chain = Arc::clone(topology.chain());

        let failure = topology.take_failure();
        let failed = failure.is_some();
        if let Some(err) = failure {
            chain.record_failure(err);
        }
        topology.mark_completed();

        let step = chain.after_run(
            failed,
            self.config.failure_policy,
            self.cancelling.load(Ordering::Acquire),
        );

        info!(
            graph = %graph,
            topology = topology.id(),
            chain = chain.id(),
            run = topology.run_index(),
            failed,
            ?step,
            "run completed"
        );

        let next = (step == ChainStep::Repeat).then(|| {
            self.inflight.add(1);
            Arc::new(Topology::new(
                self.next_topology_id(),
                topology.shared_graph(),
                Arc::clone(&chain),
                topology.run_index() + 1,
            ))
        });
        let halt = matches!(step, ChainStep::Halt | ChainStep::Cancel);

        let completion = self.registry.complete_front(&topology, next, halt);
        let released = 1 + completion.dropped.len();
        drop(completion.dropped);
        release_graph(topology);

        // The rest of the chain was cancelled while this run was active.
        let step = match step {
            ChainStep::Continue if !completion.chain_queued => ChainStep::Cancel,
            other => other,
        };

        match step {
            ChainStep::Finish | ChainStep::Halt => {
                chain.resolve();
            }
            ChainStep::Cancel => {
                debug!(graph = %graph, chain = chain.id(), "chain cancelled after its active run");
                chain.cancel();
            }
            ChainStep::Continue | ChainStep::Repeat => {}
        }

        self.inflight.sub(released);
        completion.has_front
    }

    /// Cancel every run that has not started; stop `run_until` chains.
    ///
    /// Only chains left without an active run are resolved here. The others
    /// resolve in `settle` once their active run completes, after its callback.
    fn cancel_pending(&self) {
        self.cancelling.store(true, Ordering::Release);

        let pending = self.registry.cancel_pending();
        let count = pending.cancelled.len();
        drop(pending.cancelled);

        for chain in &pending.orphaned {
            chain.cancel();
        }
        self.inflight.sub(count);
        info!(
            cancelled = count,
            resolved = pending.orphaned.len(),
            "cancelled pending runs"
        );
    }
}

/// Drop a completed run's reference to its graph.
///
/// By the time a run settles, the queue has already popped its clone. The
/// only other holders of the run are:
/// - a worker's `Job` clone, dropped when `WorkerLoop::execute` returns
///   right after that worker's `finish_node` decrement;
/// - the `front()` clone in `advance`, dropped when `advance` returns after
///   `schedule` (on the submitting thread or a worker).
///
/// Neither runs user code after its last access, so the spin is bounded by
/// a few instructions on those threads. Releasing here, before the handle
/// resolves, lets a caller mutate the graph as soon as `wait` returns.
fn release_graph(mut topology: Arc<Topology>) {
    loop {
        match Arc::try_unwrap(topology) {
            Ok(owned) => {
                drop(owned);
                return;
            }
            Err(still_shared) => {
                topology = still_shared;
                thread::yield_now();
            }
        }
    }
}
