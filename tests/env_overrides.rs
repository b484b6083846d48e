// tests/env_overrides.rs

//! Environment overrides for `[executor]`. The variables are process-global,
//! so these tests live in their own binary and take `ENV_LOCK` around every
//! mutation.

use std::io::Write;

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use dagrun::config::executor::{FAILURE_POLICY_ENV, WORKERS_ENV};
use dagrun::config::load_and_validate;
use dagrun::errors::DagrunError;
use dagrun::{ExecutorConfig, FailurePolicy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with the given overrides set, clearing them afterwards.
fn with_env<T>(workers: Option<&str>, policy: Option<&str>, f: impl FnOnce() -> T) -> T {
    let _guard = ENV_LOCK.lock();
    // SAFETY: every test in this binary holds ENV_LOCK while touching the
    // environment, and none of them spawn threads that read it concurrently.
    unsafe {
        match workers {
            Some(v) => std::env::set_var(WORKERS_ENV, v),
            None => std::env::remove_var(WORKERS_ENV),
        }
        match policy {
            Some(v) => std::env::set_var(FAILURE_POLICY_ENV, v),
            None => std::env::remove_var(FAILURE_POLICY_ENV),
        }
    }
    let out = f();
    unsafe {
        std::env::remove_var(WORKERS_ENV);
        std::env::remove_var(FAILURE_POLICY_ENV);
    }
    out
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn valid_overrides_replace_defaults() {
    let cfg = with_env(Some(" 3 "), Some("halt"), ExecutorConfig::from_env).unwrap();
    assert_eq!(cfg.workers, 3);
    assert_eq!(cfg.failure_policy, FailurePolicy::Halt);
    assert_eq!(cfg.steal_rounds, ExecutorConfig::default().steal_rounds);
}

#[test]
fn unset_variables_leave_config_untouched() {
    let base = ExecutorConfig {
        workers: 5,
        failure_policy: FailurePolicy::Halt,
        ..ExecutorConfig::default()
    };
    let cfg = with_env(None, None, || base.clone().overlay_env()).unwrap();
    assert_eq!(cfg.workers, 5);
    assert_eq!(cfg.failure_policy, FailurePolicy::Halt);
}

#[test]
fn non_numeric_workers_is_a_config_error() {
    match with_env(Some("lots"), None, ExecutorConfig::from_env) {
        Err(DagrunError::ConfigError(msg)) => {
            assert!(msg.contains(WORKERS_ENV));
            assert!(msg.contains("lots"));
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn unknown_policy_is_a_config_error() {
    match with_env(None, Some("explode"), ExecutorConfig::from_env) {
        Err(DagrunError::ConfigError(msg)) => assert!(msg.contains("explode")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn graph_file_settings_are_overridden_before_validation() {
    let file = write_config(
        r#"
[executor]
workers = 8
failure_policy = "continue"

[task.only]
cmd = "echo only"
"#,
    );

    let cfg = with_env(Some("2"), Some("halt"), || load_and_validate(file.path())).unwrap();
    assert_eq!(cfg.executor.workers, 2);
    assert_eq!(cfg.executor.failure_policy, FailurePolicy::Halt);

    // Zero workers from the environment is caught by validation.
    match with_env(Some("0"), None, || load_and_validate(file.path())) {
        Err(DagrunError::ConfigError(msg)) => assert!(msg.contains("workers")),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}
