// tests/shutdown.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use dagrun::{Executor, ExecutorConfig, RunError, ShutdownMode, Taskflow};

#[test]
fn drain_waits_for_every_queued_run() {
    let executor = executor(2);
    let rec = Recorder::new();
    let flow = DagShape {
        deps: vec![vec![], vec![0]],
    }
    .build_flow("drain", &rec);

    let handle = executor.run_n(&flow, 20).unwrap();
    executor.shutdown(ShutdownMode::Drain);

    assert_eq!(handle.try_result().unwrap().unwrap().runs, 20);
    assert_eq!(rec.count("t1"), 20);
    assert!(!flow.is_running());
}

#[test]
fn cancel_pending_counts_the_active_run_and_cancels_the_rest() {
    let executor = executor(2);
    let gate = Gate::new();
    let ran = Arc::new(AtomicUsize::new(0));

    let mut flow = Taskflow::new("cancel");
    {
        let gate = gate.clone();
        let ran = Arc::clone(&ran);
        flow.emplace("block", move || {
            ran.fetch_add(1, Ordering::SeqCst);
            gate.wait();
        })
        .unwrap();
    }

    let chain = executor.run_n(&flow, 5).unwrap();
    let queued_behind = executor.run(&flow).unwrap();

    // Let the first run become active before cancelling the rest.
    while ran.load(Ordering::SeqCst) == 0 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let opener = {
        let gate = gate.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            gate.open();
        })
    };
    executor.shutdown(ShutdownMode::CancelPending);
    opener.join().unwrap();

    assert_eq!(
        chain.try_result().unwrap(),
        Err(RunError::Cancelled { completed: 1 })
    );
    assert_eq!(
        queued_behind.try_result().unwrap(),
        Err(RunError::Cancelled { completed: 0 })
    );
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(!flow.is_running());
}

#[test]
fn cancel_pending_keeps_the_failure_of_the_active_run() {
    let executor = executor(2);
    let rec = Recorder::new();
    let gate = Gate::new();

    let mut flow = Taskflow::new("cancel-failing");
    {
        let gate = gate.clone();
        let rec = rec.clone();
        flow.emplace_fallible("doomed", move || {
            rec.mark("started");
            gate.wait();
            Err(anyhow::anyhow!("gave up"))
        })
        .unwrap();
    }

    let handle = executor
        .run_n_with(&flow, 3, rec.marker("cb"))
        .unwrap();
    while rec.marks("started").is_empty() {
        std::thread::sleep(Duration::from_millis(1));
    }

    // Callbacks seen at the moment the handle resolves.
    let observer = {
        let handle = handle.clone();
        let rec = rec.clone();
        std::thread::spawn(move || {
            let outcome = handle.wait();
            (outcome, rec.marks("cb").len())
        })
    };
    let opener = {
        let gate = gate.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    executor.shutdown(ShutdownMode::CancelPending);
    opener.join().unwrap();

    let (outcome, callbacks_at_resolve) = observer.join().unwrap();
    match outcome {
        Err(RunError::TaskFailed { task, message }) => {
            assert_eq!(task, "doomed");
            assert!(message.contains("gave up"));
        }
        other => panic!("expected the task failure, got {other:?}"),
    }
    assert_eq!(callbacks_at_resolve, 1);
    assert_eq!(rec.marks("cb").len(), 1);
    assert_eq!(rec.marks("started").len(), 1);
}

#[test]
fn cancel_pending_stops_run_until_after_the_active_run() {
    let executor = executor(2);
    let rec = Recorder::new();
    let flow = linear("forever", 2, &rec);

    let handle = executor
        .run_until_with(&flow, |_| false, rec.marker("cb"))
        .unwrap();
    while rec.count("t1") < 3 {
        std::thread::sleep(Duration::from_millis(1));
    }
    executor.shutdown(ShutdownMode::CancelPending);

    match handle.try_result() {
        Some(Err(RunError::Cancelled { completed })) => {
            assert!(completed >= 3);
            assert_eq!(rec.count("t1"), completed);
        }
        other => panic!("expected a cancelled run_until, got {other:?}"),
    }
    assert!(rec.marks("cb").is_empty());
}

#[test]
fn drop_uses_configured_shutdown_mode() {
    init_tracing();
    let rec = Recorder::new();
    let flow = linear("dropped", 3, &rec);

    let handle = {
        let executor = Executor::new(ExecutorConfig {
            shutdown_mode: ShutdownMode::Drain,
            ..config(3)
        })
        .unwrap();
        executor.run_n(&flow, 4).unwrap()
    };

    assert_eq!(handle.try_result().unwrap().unwrap().runs, 4);
    assert_eq!(rec.count("t2"), 4);
}

#[test]
fn worker_threads_carry_the_configured_name() {
    init_tracing();
    let rec = Recorder::new();
    let flow = linear("named", 1, &rec);

    let executor = Executor::new(ExecutorConfig {
        thread_name: "dag-pool".to_string(),
        ..config(2)
    })
    .unwrap();
    wait_with_timeout(&executor.run(&flow).unwrap()).unwrap();

    let threads = rec.threads("t0");
    let name = threads[0].clone().unwrap();
    assert!(name.starts_with("dag-pool-"), "unexpected thread name {name}");
}

#[test]
fn invalid_config_is_rejected() {
    assert!(Executor::with_workers(0).is_err());
    let err = Executor::new(ExecutorConfig {
        steal_rounds: 0,
        ..config(1)
    })
    .unwrap_err();
    assert!(err.to_string().contains("steal_rounds"));
}
