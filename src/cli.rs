// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a DAG of shell commands on a work-stealing thread pool.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the graph file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Dagrun.toml")]
    pub config: String,

    /// Run the graph this many times back to back.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub runs: usize,

    /// Number of worker threads; overrides `[executor].workers`.
    #[arg(long, value_name = "W")]
    pub workers: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print the graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
