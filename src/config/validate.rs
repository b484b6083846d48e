// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{GraphFile, RawGraphFile};
use crate::errors::{DagrunError, Result};

impl TryFrom<RawGraphFile> for GraphFile {
    type Error = DagrunError;

    fn try_from(raw: RawGraphFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_graph(&raw)?;
        Ok(GraphFile::new_unchecked(raw.executor, raw.task))
    }
}

fn validate_raw_graph(cfg: &RawGraphFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    cfg.executor.validate()?;
    validate_commands(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawGraphFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DagrunError::ConfigError(
            "graph file must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_commands(cfg: &RawGraphFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(DagrunError::ConfigError(format!(
                "task '{name}' has an empty `cmd`"
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawGraphFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(DagrunError::ConfigError(format!(
                    "task '{name}' cannot depend on itself in `after`"
                )));
            }
            if !cfg.task.contains_key(dep) {
                return Err(DagrunError::ConfigError(format!(
                    "task '{name}' has unknown dependency '{dep}' in `after`"
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawGraphFile) -> Result<()> {
    // Edge direction: dep -> task, so `[task.B] after = ["A"]` adds A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(DagrunError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}
