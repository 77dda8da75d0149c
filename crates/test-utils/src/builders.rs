#![allow(dead_code)]

use std::collections::BTreeMap;

use hostdag::config::{AffinityEntry, ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use hostdag::dag::{TaskGraph, TaskSpec};
use hostdag::errors::HostdagError;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                affinity: Vec::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_affinity(mut self, a: &str, b: &str, score: f64) -> Self {
        self.config.affinity.push(AffinityEntry {
            a: a.to_string(),
            b: b.to_string(),
            score,
        });
        self
    }

    /// Edit the `[config]` section in place.
    pub fn section(mut self, edit: impl FnOnce(&mut ConfigSection)) -> Self {
        edit(&mut self.config.config);
        self
    }

    pub fn try_build(self) -> Result<ConfigFile, HostdagError> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
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
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A task with no action, e.g. an existing input file.
    pub fn source() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn location(mut self, host: &str) -> Self {
        self.task.location.push(host.to_string());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.task.size = size;
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Graph from `(name, prerequisites)` pairs; every task gets `echo <name>`.
pub fn graph_of(edges: &[(&str, &[&str])]) -> TaskGraph {
    TaskGraph::new(edges.iter().map(|(name, prereqs)| {
        prereqs
            .iter()
            .fold(TaskSpec::new(name).cmd(&format!("echo {name}")), |spec, p| spec.after(p))
    }))
}

/// Random-DAG helper: task `i` may only depend on tasks `0..i`.
pub fn layered_specs(raw_deps: &[Vec<usize>]) -> Vec<TaskSpec> {
    raw_deps
        .iter()
        .enumerate()
        .map(|(i, deps)| {
            let mut spec = TaskSpec::new(&format!("task_{i}")).cmd(&format!("echo task_{i}"));
            if i > 0 {
                let mut seen = Vec::new();
                for d in deps {
                    let dep = d % i;
                    if !seen.contains(&dep) {
                        seen.push(dep);
                        spec = spec.after(&format!("task_{dep}"));
                    }
                }
            }
            spec
        })
        .collect()
}
