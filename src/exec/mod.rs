// src/exec/mod.rs

//! Execution layer.
//!
//! - [`executor`] owns the worker threads and the shared scheduling state.
//! - [`worker`] is the per-thread loop: local deque, injector, stealing.
//! - [`notifier`] parks idle workers and wakes them when work shows up.
//! - [`command`] runs shell-command payloads.

pub mod command;
pub mod executor;
mod notifier;
mod worker;

pub use command::CommandSpec;
pub use executor::Executor;
