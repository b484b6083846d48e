// src/engine/controller.rs

//! Run requests: the caller-facing half of the executor.
//!
//! Every request validates the graph, creates a [`RunChain`] and hands the
//! chain's first run(s) to the scheduler. Callback semantics differ per
//! request and are part of the contract:
//!
//! | request      | runs                          | callback fires          |
//! |--------------|-------------------------------|-------------------------|
//! | `run`        | 1                             | once                    |
//! | `run_n`      | `n`, enqueued up front        | after every run         |
//! | `run_until`  | until the predicate says stop | once, after the last run|

use tracing::info;

use crate::dag::Taskflow;
use crate::engine::chain::{Callback, RunChain, RunPlan};
use crate::engine::promise::RunHandle;
use crate::errors::Result;
use crate::exec::Executor;

impl Executor {
    /// Run `flow` once.
    pub fn run(&self, flow: &Taskflow) -> Result<RunHandle> {
        self.submit(flow, RunPlan::Once, None)
    }

    /// Run `flow` once and call `callback` when it completes, before the
    /// handle resolves.
    pub fn run_with<C>(&self, flow: &Taskflow, callback: C) -> Result<RunHandle>
    where
        C: FnMut() + Send + 'static,
    {
        self.submit(flow, RunPlan::Once, Some(Box::new(callback)))
    }

    /// Run `flow` `n` times back to back. `n == 0` resolves immediately.
    pub fn run_n(&self, flow: &Taskflow, n: usize) -> Result<RunHandle> {
        self.submit(flow, RunPlan::Times(n), None)
    }

    /// Like [`Executor::run_n`], calling `callback` after each of the runs.
    pub fn run_n_with<C>(&self, flow: &Taskflow, n: usize, callback: C) -> Result<RunHandle>
    where
        C: FnMut() + Send + 'static,
    {
        self.submit(flow, RunPlan::Times(n), Some(Box::new(callback)))
    }

    /// Run `flow` repeatedly until `predicate` returns `true`.
    ///
    /// The predicate is called after each run with the number of runs
    /// completed so far, so the graph always runs at least once.
    pub fn run_until<P>(&self, flow: &Taskflow, predicate: P) -> Result<RunHandle>
    where
        P: FnMut(usize) -> bool + Send + 'static,
    {
        let plan = RunPlan::Until(parking_lot::Mutex::new(Box::new(predicate)));
        self.submit(flow, plan, None)
    }

    /// Like [`Executor::run_until`], calling `callback` once after the
    /// predicate stopped the chain.
    pub fn run_until_with<P, C>(&self, flow: &Taskflow, predicate: P, callback: C) -> Result<RunHandle>
    where
        P: FnMut(usize) -> bool + Send + 'static,
        C: FnMut() + Send + 'static,
    {
        let plan = RunPlan::Until(parking_lot::Mutex::new(Box::new(predicate)));
        self.submit(flow, plan, Some(Box::new(callback)))
    }

    fn submit(&self, flow: &Taskflow, plan: RunPlan, callback: Option<Callback>) -> Result<RunHandle> {
        flow.graph().validate()?;

        let shared = self.shared();
        let (chain, handle) = RunChain::new(shared.next_chain_id(), plan, callback);

        info!(
            graph = %flow.name(),
            chain = chain.id(),
            plan = ?chain.plan(),
            tasks = flow.graph().len(),
            "submitting run request"
        );

        shared.submit(flow.shared_graph(), chain);
        Ok(handle)
    }
}
