// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::model::ConfigFile;
use crate::dag::node::{TaskNode, TaskSpec};
use crate::errors::{HostdagError, Result};
use crate::types::TaskName;

/// Task definitions plus the lazily materialised [`TaskNode`]s.
///
/// Nodes are created on first reference during a search and live as long as
/// the graph. Ids come from a counter owned by the graph, in creation order.
#[derive(Debug)]
pub struct TaskGraph {
    specs: BTreeMap<TaskName, TaskSpec>,
    /// Reverse edges, for picking default targets.
    dependents: HashMap<TaskName, Vec<TaskName>>,
    nodes: Mutex<HashMap<TaskName, Arc<TaskNode>>>,
    next_id: AtomicU64,
}

impl TaskGraph {
    pub fn new(specs: impl IntoIterator<Item = TaskSpec>) -> Self {
        let specs: BTreeMap<TaskName, TaskSpec> =
            specs.into_iter().map(|s| (s.name.clone(), s)).collect();

        let mut dependents: HashMap<TaskName, Vec<TaskName>> = HashMap::new();
        for spec in specs.values() {
            for prereq in &spec.prerequisites {
                dependents
                    .entry(prereq.clone())
                    .or_default()
                    .push(spec.name.clone());
            }
        }

        Self {
            specs,
            dependents,
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Build a graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.task.iter().map(|(name, tc)| TaskSpec {
            name: name.clone(),
            prerequisites: tc.after.clone(),
            cmd: tc.cmd.clone(),
            size: tc.size,
            location: tc.location.clone(),
        }))
    }

    /// All task names, sorted.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(|s| s.as_str())
    }

    pub fn spec(&self, name: &str) -> Option<&TaskSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Tasks no other task depends on.
    pub fn sinks(&self) -> Vec<TaskName> {
        self.specs
            .keys()
            .filter(|name| !self.dependents.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Walk the prerequisite definitions below `target` and return the first
    /// chain that leads back into itself, ending with the repeated task.
    ///
    /// Works on the static definitions only; no nodes are materialised.
    /// Prerequisites that name unknown tasks are skipped here and reported by
    /// the search.
    pub fn find_cycle(&self, target: &str) -> Result<Option<Vec<TaskName>>> {
        let root = self
            .specs
            .get(target)
            .ok_or_else(|| HostdagError::TaskNotFound(target.to_string()))?;

        let mut path: Vec<&str> = vec![root.name.as_str()];
        let mut done: HashSet<&str> = HashSet::new();
        let mut iters = vec![root.prerequisites.iter()];

        while let Some(it) = iters.last_mut() {
            let Some(next) = it.next() else {
                iters.pop();
                if let Some(name) = path.pop() {
                    done.insert(name);
                }
                continue;
            };
            if path.contains(&next.as_str()) {
                let mut chain: Vec<TaskName> = path.iter().map(|s| s.to_string()).collect();
                chain.push(next.clone());
                return Ok(Some(chain));
            }
            if done.contains(next.as_str()) {
                continue;
            }
            if let Some(spec) = self.specs.get(next) {
                path.push(spec.name.as_str());
                iters.push(spec.prerequisites.iter());
            }
        }
        Ok(None)
    }

    /// Fetch the node for `name`, creating it on first reference.
    pub fn node(&self, name: &str) -> Result<Arc<TaskNode>> {
        let mut nodes = self.nodes.lock();
        if let Some(node) = nodes.get(name) {
            return Ok(Arc::clone(node));
        }
        let spec = self
            .specs
            .get(name)
            .ok_or_else(|| HostdagError::TaskNotFound(name.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let node = Arc::new(TaskNode::new(id, spec.clone()));
        nodes.insert(name.to_string(), Arc::clone(&node));
        Ok(node)
    }

    /// Node for `name` if it has been materialised.
    pub fn existing(&self, name: &str) -> Option<Arc<TaskNode>> {
        self.nodes.lock().get(name).cloned()
    }

    /// Number of nodes materialised so far.
    pub fn materialised(&self) -> usize {
        self.nodes.lock().len()
    }
}
