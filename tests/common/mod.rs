#![allow(dead_code)]

use dagrun::{Executor, ExecutorConfig, FailurePolicy, ShutdownMode};

pub use dagrun_test_utils::builders::*;
pub use dagrun_test_utils::recorder::Recorder;
pub use dagrun_test_utils::{Gate, init_tracing, wait_with_timeout};

/// Executor with a fixed seed so victim selection is reproducible.
pub fn executor(workers: usize) -> Executor {
    init_tracing();
    Executor::new(config(workers)).expect("executor starts")
}

pub fn executor_with_policy(workers: usize, policy: FailurePolicy) -> Executor {
    init_tracing();
    let mut cfg = config(workers);
    cfg.failure_policy = policy;
    Executor::new(cfg).expect("executor starts")
}

pub fn config(workers: usize) -> ExecutorConfig {
    ExecutorConfig {
        seed: Some(7),
        shutdown_mode: ShutdownMode::Drain,
        ..ExecutorConfig::with_workers(workers)
    }
}
