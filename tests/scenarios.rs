// tests/scenarios.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use common::*;
use dagrun::{RunError, Taskflow};

#[test]
fn fan_out_runs_root_before_both_children() {
    let executor = executor(4);
    let rec = Recorder::new();
    let flow = fan_out("fan-out", &rec);

    let outcome = wait_with_timeout(&executor.run(&flow).unwrap());
    assert_eq!(outcome.unwrap().runs, 1);

    let a_end = rec.last_end("A").unwrap();
    assert!(a_end < rec.first_start("B").unwrap());
    assert!(a_end < rec.first_start("C").unwrap());
    assert_eq!(rec.count("A"), 1);
    assert_eq!(rec.count("B"), 1);
    assert_eq!(rec.count("C"), 1);
    // Both children ended before the handle resolved.
    assert_eq!(rec.ends("B").len(), 1);
    assert_eq!(rec.ends("C").len(), 1);
}

#[test]
fn run_n_increments_counter_in_order() {
    let executor = executor(4);
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut flow = Taskflow::new("counter");
    {
        let counter = Arc::clone(&counter);
        let seen = Arc::clone(&seen);
        flow.emplace("inc", move || {
            let before = counter.fetch_add(1, Ordering::SeqCst);
            seen.lock().push(before);
        })
        .unwrap();
    }

    let report = wait_with_timeout(&executor.run_n(&flow, 4).unwrap()).unwrap();

    assert_eq!(report.runs, 4);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
    assert_eq!(*seen.lock(), vec![0, 1, 2, 3]);
}

#[test]
fn run_until_stops_on_tenth_predicate_call() {
    let executor = executor(4);
    let rec = Recorder::new();
    let flow = linear("until", 3, &rec);

    let calls = Arc::new(AtomicUsize::new(0));
    let handle = {
        let calls = Arc::clone(&calls);
        executor
            .run_until_with(
                &flow,
                move |_| calls.fetch_add(1, Ordering::SeqCst) + 1 == 10,
                rec.marker("done"),
            )
            .unwrap()
    };

    let report = wait_with_timeout(&handle).unwrap();
    assert_eq!(report.runs, 10);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    for task in ["t0", "t1", "t2"] {
        assert_eq!(rec.count(task), 10, "{task} ran a wrong number of times");
    }

    let marks = rec.marks("done");
    assert_eq!(marks.len(), 1, "callback fires exactly once");
    assert!(marks[0] > rec.last_end("t2").unwrap());
}

#[test]
fn failing_task_is_reported_and_siblings_still_run() {
    let executor = executor(4);
    let rec = Recorder::new();

    let mut flow = Taskflow::new("with-failure");
    let x = flow.emplace_work("X", failing("boom")).unwrap();
    let after_x = flow.emplace("after-X", rec.task("after-X")).unwrap();
    flow.emplace("sibling", rec.task_sleep("sibling", Duration::from_millis(20)))
        .unwrap();
    flow.precede(x, [after_x]).unwrap();

    let other_rec = Recorder::new();
    let other = linear("unrelated", 4, &other_rec);

    let failing_handle = executor.run(&flow).unwrap();
    let other_handle = executor.run(&other).unwrap();

    let err = wait_with_timeout(&failing_handle).unwrap_err();
    assert_eq!(
        err,
        RunError::TaskFailed {
            task: "X".to_string(),
            message: "boom".to_string(),
        }
    );
    assert_eq!(rec.count("sibling"), 1);
    assert_eq!(rec.ends("sibling").len(), 1);
    // Structural drain: the failed node's successor still becomes ready.
    assert_eq!(rec.count("after-X"), 1);

    let report = wait_with_timeout(&other_handle).unwrap();
    assert_eq!(report.runs, 1);
    assert_eq!(other_rec.count("t3"), 1);
}

#[test]
fn independent_graphs_run_concurrently_and_keep_their_own_order() {
    let executor = executor(4);
    let rec = Recorder::new();

    let mut flows = Vec::new();
    for g in ["g1", "g2"] {
        let mut flow = Taskflow::new(g);
        let mut prev = None;
        for i in 0..3 {
            let label = format!("{g}.t{i}");
            let id = flow
                .emplace(label.clone(), rec.task_sleep(&label, Duration::from_millis(2)))
                .unwrap();
            if let Some(p) = prev {
                flow.precede(p, [id]).unwrap();
            }
            prev = Some(id);
        }
        flows.push(flow);
    }

    let handles: Vec<_> = flows
        .iter()
        .map(|flow| executor.run_n(flow, 3).unwrap())
        .collect();

    executor.wait_for_all();
    assert_eq!(executor.num_topologies(), 0);

    for handle in &handles {
        assert!(handle.is_ready());
        assert_eq!(handle.try_result().unwrap().unwrap().runs, 3);
    }

    for g in ["g1", "g2"] {
        let first = rec.starts(&format!("{g}.t0"));
        let last = rec.ends(&format!("{g}.t2"));
        assert_eq!(first.len(), 3);
        assert_eq!(last.len(), 3);
        for k in 0..2 {
            assert!(
                last[k] < first[k + 1],
                "{g}: run {} started before run {k} finished",
                k + 1
            );
        }
    }
}
