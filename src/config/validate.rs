// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::{TaskGraph, TaskSpec};
use crate::errors::{HostdagError, Result};
use crate::queue::AffinityTable;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::HostdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.affinity, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_dependencies(cfg)?;
    AffinityTable::from_config(&cfg.affinity)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(HostdagError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let c = &cfg.config;

    if c.hostfile.is_some() && c.num_threads.is_some() {
        return Err(HostdagError::ConfigError(
            "[config] cannot set `hostfile` and `num_threads` simultaneously".to_string(),
        ));
    }
    if c.num_threads == Some(0) {
        return Err(HostdagError::ConfigError(
            "[config].num_threads must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.base_wait_ms == 0 {
        return Err(HostdagError::ConfigError(
            "[config].base_wait_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if c.max_backoff_level > 20 {
        return Err(HostdagError::ConfigError(format!(
            "[config].max_backoff_level must be <= 20 (got {})",
            c.max_backoff_level
        )));
    }
    for target in &c.default {
        if !cfg.task.contains_key(target) {
            return Err(HostdagError::ConfigError(format!(
                "[config].default names unknown task '{target}'"
            )));
        }
    }

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(HostdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(HostdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: prerequisite -> task.
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
        Err(cycle) => {
            let node = cycle.node_id();
            let graph = TaskGraph::new(cfg.task.iter().map(|(name, tc)| {
                let mut spec = TaskSpec::new(name);
                spec.prerequisites = tc.after.clone();
                spec
            }));
            let chain = graph
                .find_cycle(node)?
                .unwrap_or_else(|| vec![node.to_string(), node.to_string()]);
            Err(HostdagError::DagCycle { chain })
        }
    }
}
