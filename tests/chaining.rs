// tests/chaining.rs

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use dagrun::Taskflow;

#[test]
fn run_n_callback_fires_after_every_run_before_the_next_starts() {
    let executor = executor(4);
    let rec = Recorder::new();
    let flow = DagShape {
        deps: vec![vec![], vec![0], vec![0], vec![1, 2]],
    }
    .build_flow("diamond", &rec);

    let handle = executor.run_n_with(&flow, 5, rec.marker("cb")).unwrap();
    assert_eq!(wait_with_timeout(&handle).unwrap().runs, 5);

    let cb = rec.marks("cb");
    let sink_ends = rec.ends("t3");
    let source_starts = rec.starts("t0");
    assert_eq!(cb.len(), 5);
    for k in 0..5 {
        assert!(sink_ends[k] < cb[k], "callback {k} ran before its run finished");
        if k + 1 < 5 {
            assert!(cb[k] < source_starts[k + 1], "run {} seeded before callback {k}", k + 1);
        }
    }
}

#[test]
fn separate_requests_on_one_graph_run_in_submission_order() {
    let executor = executor(4);
    let rec = Recorder::new();
    let flow = linear("fifo", 2, &rec);

    let first = executor.run_with(&flow, rec.marker("first")).unwrap();
    let second = executor.run_n_with(&flow, 2, rec.marker("second")).unwrap();
    let third = executor.run_with(&flow, rec.marker("third")).unwrap();

    for handle in [&first, &second, &third] {
        wait_with_timeout(handle).unwrap();
    }

    let first_mark = rec.marks("first");
    let second_marks = rec.marks("second");
    let third_mark = rec.marks("third");
    assert_eq!(first_mark.len(), 1);
    assert_eq!(second_marks.len(), 2);
    assert_eq!(third_mark.len(), 1);
    assert!(first_mark[0] < second_marks[0]);
    assert!(second_marks[1] < third_mark[0]);
    assert_eq!(rec.count("t0"), 4);
}

#[test]
fn run_n_zero_resolves_immediately_without_running() {
    let executor = executor(2);
    let rec = Recorder::new();
    let flow = linear("zero", 2, &rec);

    let handle = executor.run_n_with(&flow, 0, rec.marker("cb")).unwrap();

    assert!(handle.is_ready());
    assert_eq!(handle.try_result().unwrap().unwrap().runs, 0);
    assert_eq!(rec.count("t0"), 0);
    assert!(rec.marks("cb").is_empty());
    assert!(!flow.is_running());
}

#[test]
fn run_until_runs_at_least_once_and_sees_completed_counts() {
    let executor = executor(2);
    let rec = Recorder::new();
    let flow = linear("until-once", 1, &rec);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let handle = {
        let seen = Arc::clone(&seen);
        executor
            .run_until(&flow, move |completed| {
                seen.lock().push(completed);
                true
            })
            .unwrap()
    };

    assert_eq!(wait_with_timeout(&handle).unwrap().runs, 1);
    assert_eq!(rec.count("t0"), 1);
    assert_eq!(*seen.lock(), vec![1]);
}

#[test]
fn run_until_follow_up_runs_ahead_of_later_requests() {
    let executor = executor(2);
    let rec = Recorder::new();
    let flow = linear("until-front", 1, &rec);

    let gate = Gate::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let until = {
        let calls = Arc::clone(&calls);
        let gate = gate.clone();
        executor
            .run_until_with(
                &flow,
                move |completed| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if completed == 1 {
                        gate.wait();
                    }
                    completed == 3
                },
                rec.marker("until-done"),
            )
            .unwrap()
    };
    // Queued while the first run_until predicate call is blocked.
    std::thread::sleep(Duration::from_millis(20));
    let later = executor.run_with(&flow, rec.marker("later")).unwrap();
    gate.open();

    wait_with_timeout(&until).unwrap();
    wait_with_timeout(&later).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(rec.marks("until-done")[0] < rec.marks("later")[0]);
    assert_eq!(rec.count("t0"), 4);
}

#[test]
fn empty_graph_completes_every_run() {
    let executor = executor(2);
    let flow = Taskflow::new("empty");
    let fired = Arc::new(AtomicUsize::new(0));

    let handle = {
        let fired = Arc::clone(&fired);
        executor
            .run_n_with(&flow, 3, move || {
                fired.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
    };

    assert_eq!(wait_with_timeout(&handle).unwrap().runs, 3);
    assert_eq!(fired.load(Ordering::SeqCst), 3);

    let until = executor.run_until(&flow, |completed| completed == 4).unwrap();
    assert_eq!(wait_with_timeout(&until).unwrap().runs, 4);
}

#[test]
fn queued_runs_are_visible_per_graph() {
    let executor = executor(2);
    let gate = Gate::new();

    let mut flow = Taskflow::new("blocked");
    {
        let gate = gate.clone();
        flow.emplace("wait", move || gate.wait()).unwrap();
    }

    let handle = executor.run_n(&flow, 3).unwrap();
    assert_eq!(executor.queued_runs(flow.id()), 3);
    assert_eq!(executor.num_topologies(), 3);
    assert!(flow.is_running());

    gate.open();
    assert_eq!(wait_with_timeout(&handle).unwrap().runs, 3);
    executor.wait_for_all();
    assert_eq!(executor.queued_runs(flow.id()), 0);
    assert_eq!(executor.num_topologies(), 0);
}
