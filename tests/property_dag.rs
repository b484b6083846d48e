// tests/property_dag.rs

mod common;

use std::collections::HashSet;

use proptest::prelude::*;

use common::*;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_shape_strategy(max_tasks: usize) -> impl Strategy<Value = DagShape> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..4),
            num_tasks,
        )
        .prop_map(|raw_deps| {
            let deps = raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    if i == 0 {
                        return Vec::new();
                    }
                    let unique: HashSet<usize> = potential.into_iter().map(|d| d % i).collect();
                    let mut deps: Vec<usize> = unique.into_iter().collect();
                    deps.sort_unstable();
                    deps
                })
                .collect();
            DagShape { deps }
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_node_runs_once_per_run_after_its_predecessors(
        shape in dag_shape_strategy(16),
        workers in 1..5usize,
        runs in 1..4usize,
    ) {
        let executor = executor(workers);
        let rec = Recorder::new();
        let flow = shape.build_flow("random", &rec);

        let report = wait_with_timeout(&executor.run_n(&flow, runs).unwrap()).unwrap();
        prop_assert_eq!(report.runs, runs);

        for i in 0..shape.len() {
            let name = DagShape::task_name(i);
            prop_assert_eq!(rec.count(&name), runs, "{} ran a wrong number of times", name);
        }

        // Runs never overlap, so the k-th start of `to` pairs with the k-th
        // end of `from`.
        for (from, to) in shape.edges() {
            let ends = rec.ends(&DagShape::task_name(from));
            let starts = rec.starts(&DagShape::task_name(to));
            for k in 0..runs {
                prop_assert!(
                    ends[k] < starts[k],
                    "t{} started before its predecessor t{} finished (run {})",
                    to, from, k
                );
            }
        }
    }
}
