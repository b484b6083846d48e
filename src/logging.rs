// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Filter priority:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `DAGRUN_LOG` environment variable, in `EnvFilter` syntax
//!    (e.g. `debug` or `dagrun::exec=trace,info`)
//! 3. `info`
//!
//! Logs go to stderr; stdout is left to the summary printed by the binary.
//! Worker thread names are included, since most events come from workers.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "DAGRUN_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(directive_for(lvl)),
        None => match std::env::var(LOG_ENV) {
            Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec.trim())
                .with_context(|| format!("invalid {LOG_ENV} filter '{spec}'"))?,
            _ => EnvFilter::new("info"),
        },
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;

    Ok(())
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
