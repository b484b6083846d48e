#![allow(dead_code)]

use std::collections::BTreeMap;

use dagrun::config::{ExecutorConfig, GraphFile, RawGraphFile, TaskConfig};
use dagrun::{Taskflow, Work};

use crate::recorder::Recorder;

/// Builder for `GraphFile` to simplify config-layer tests.
pub struct GraphFileBuilder {
    raw: RawGraphFile,
}

impl GraphFileBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawGraphFile {
                executor: ExecutorConfig::with_workers(2),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.raw.task.insert(name.to_string(), task);
        self
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.raw.executor = executor;
        self
    }

    pub fn raw(self) -> RawGraphFile {
        self.raw
    }

    pub fn build(self) -> GraphFile {
        GraphFile::try_from(self.raw).expect("Failed to build valid graph file from builder")
    }
}

impl Default for GraphFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                after: vec![],
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Adjacency description of a DAG: `deps[i]` lists the predecessors of
/// task `i`. Only indices `< i` are allowed, which keeps it acyclic.
#[derive(Debug, Clone)]
pub struct DagShape {
    pub deps: Vec<Vec<usize>>,
}

impl DagShape {
    pub fn task_name(i: usize) -> String {
        format!("t{i}")
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// All edges `(from, to)`.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.deps
            .iter()
            .enumerate()
            .flat_map(|(to, preds)| preds.iter().map(move |&from| (from, to)))
            .collect()
    }

    /// Build a taskflow whose every task is a recorder task.
    pub fn build_flow(&self, name: &str, recorder: &Recorder) -> Taskflow {
        let mut flow = Taskflow::new(name);
        let ids: Vec<_> = (0..self.deps.len())
            .map(|i| {
                let label = Self::task_name(i);
                flow.emplace(label.clone(), recorder.task(&label))
                    .expect("unique task names")
            })
            .collect();

        for (to, preds) in self.deps.iter().enumerate() {
            for &from in preds {
                assert!(from < to, "DagShape deps must point to lower indices");
                flow.precede(ids[from], [ids[to]]).expect("valid edge");
            }
        }
        flow
    }
}

/// `A -> {B, C}`.
pub fn fan_out(name: &str, recorder: &Recorder) -> Taskflow {
    let mut flow = Taskflow::new(name);
    let a = flow.emplace("A", recorder.task("A")).unwrap();
    let b = flow.emplace("B", recorder.task("B")).unwrap();
    let c = flow.emplace("C", recorder.task("C")).unwrap();
    flow.precede(a, [b, c]).unwrap();
    flow
}

/// `t0 -> t1 -> ... -> t{n-1}`.
pub fn linear(name: &str, n: usize, recorder: &Recorder) -> Taskflow {
    let shape = DagShape {
        deps: (0..n)
            .map(|i| if i == 0 { vec![] } else { vec![i - 1] })
            .collect(),
    };
    shape.build_flow(name, recorder)
}

/// Payload that always fails with `message`.
pub fn failing(message: &str) -> Work {
    let message = message.to_string();
    Work::from_fallible(move || Err(anyhow::anyhow!("{message}")))
}
