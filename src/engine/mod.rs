// src/engine/mod.rs

//! Run orchestration.
//!
//! This module ties together:
//! - [`topology`]: one run of a graph and its per-run counters
//! - [`chain`]: the state shared by all runs of one request (plan, callback,
//!   first failure, promise)
//! - [`queue`]: the per-graph FIFO that serialises runs of the same graph
//! - [`promise`]: the one-shot result handle returned to callers
//! - [`controller`]: `run`, `run_n`, `run_until` on [`Executor`](crate::exec::Executor)
//!
//! The worker pool that actually executes nodes lives in [`crate::exec`].

pub(crate) mod chain;
mod controller;
pub mod promise;
pub(crate) mod queue;
pub(crate) mod topology;

pub use promise::{RunHandle, RunOutcome, RunReport};

pub(crate) use chain::{ChainStep, RunChain};
pub(crate) use queue::TopologyQueue;
pub(crate) use topology::Topology;
