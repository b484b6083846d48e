// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

pub use config::ExecutorConfig;
pub use dag::{Graph, GraphId, Node, TaskId, TaskOutcome, Taskflow, Work};
pub use engine::{RunHandle, RunOutcome, RunReport};
pub use errors::{DagrunError, RunError};
pub use exec::Executor;
pub use types::{FailurePolicy, ShutdownMode};

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::GraphFile;

/// High-level entry point used by `main.rs`.
///
/// Loads the graph file, builds the task graph, runs it `--runs` times on a
/// fresh executor and prints a one-line summary. Fails if any run failed.
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let file = load_and_validate(&config_path)
        .with_context(|| format!("loading graph file '{}'", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&file);
        return Ok(());
    }

    let flow = file.build_taskflow(graph_name(&config_path))?;

    let mut exec_config = file.executor.clone();
    if let Some(workers) = args.workers {
        exec_config.workers = workers;
    }
    let executor = Executor::new(exec_config)?;

    info!(
        graph = %flow.name(),
        tasks = flow.graph().len(),
        edges = flow.graph().num_edges(),
        runs = args.runs,
        workers = executor.num_workers(),
        "starting"
    );

    let started = Instant::now();
    let handle = executor.run_n(&flow, args.runs)?;
    let outcome = handle.wait();
    let elapsed = started.elapsed();

    executor.shutdown(ShutdownMode::Drain);

    match outcome {
        Ok(report) => {
            println!(
                "dagrun: {} run(s) of '{}' completed in {:.2?}",
                report.runs,
                flow.name(),
                elapsed
            );
            Ok(())
        }
        Err(err) => Err(DagrunError::Run(err)).context(format!("running '{}'", flow.name())),
    }
}

/// Graph name derived from the file stem (`ci.toml` -> `ci`).
fn graph_name(config_path: &Path) -> String {
    config_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dagrun".to_string())
}

/// Print executor settings, tasks, dependencies and commands.
fn print_dry_run(file: &GraphFile) {
    println!("dagrun dry-run");
    println!("  executor.workers = {}", file.executor.workers);
    println!("  executor.steal_rounds = {}", file.executor.steal_rounds);
    println!("  executor.failure_policy = {:?}", file.executor.failure_policy);
    println!("  executor.shutdown_mode = {:?}", file.executor.shutdown_mode);
    println!();

    println!("roots: {:?}", file.roots());
    println!("tasks ({}):", file.task.len());
    for (name, task) in file.task.iter() {
        println!("  - {name}");
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
    }

    debug!("dry-run complete (no execution)");
}
