// src/exec/command.rs

//! Shell-command payloads.

use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::dag::TaskOutcome;

/// A command line run through the platform shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub cmd: String,
}

impl CommandSpec {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// Run `spec` to completion on the calling worker thread.
///
/// Spawn and wait errors are reported as failures, the same as a non-zero
/// exit status.
pub(crate) fn run_command(task: &str, spec: &CommandSpec) -> TaskOutcome {
    match run_command_inner(task, spec) {
        Ok(outcome) => outcome,
        Err(err) => TaskOutcome::Failed(format!("{err:#}")),
    }
}

fn run_command_inner(task: &str, spec: &CommandSpec) -> Result<TaskOutcome> {
    debug!(task, cmd = %spec.cmd, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&spec.cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&spec.cmd);
        c
    };

    let output = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("running process for task '{task}'"))?;

    log_output(task, &output);

    let code = output.status.code().unwrap_or(-1);
    info!(
        task,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if output.status.success() {
        Ok(TaskOutcome::Success)
    } else {
        Ok(TaskOutcome::Failed(format!("exit code {code}")))
    }
}

fn log_output(task: &str, output: &Output) {
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(task, "stdout: {}", line);
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        debug!(task, "stderr: {}", line);
    }
}
