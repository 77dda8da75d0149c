// src/exec/location.rs

//! Where finished artifacts live.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::dag::TaskGraph;
use crate::types::{Host, TaskName};

/// Answers which hosts hold the artifacts of the given tasks. Tasks the
/// oracle knows nothing about are simply absent from the result.
pub trait LocationOracle: Send + Sync {
    fn locate(&self, names: &[TaskName]) -> HashMap<TaskName, Vec<Host>>;

    /// Called after `name` ran on `host`. Oracles that learn from
    /// execution override this.
    fn observe(&self, _name: &str, _host: &str) {}
}

/// Knows nothing; every finished node keeps its declared location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocations;

impl LocationOracle for NoLocations {
    fn locate(&self, _names: &[TaskName]) -> HashMap<TaskName, Vec<Host>> {
        HashMap::new()
    }
}

/// Locations declared in the task definitions (`location = [...]`).
#[derive(Debug, Clone, Default)]
pub struct DeclaredLocations {
    declared: HashMap<TaskName, Vec<Host>>,
}

impl DeclaredLocations {
    pub fn from_graph(graph: &TaskGraph) -> Self {
        let declared = graph
            .task_names()
            .filter_map(|name| {
                let spec = graph.spec(name)?;
                (!spec.location.is_empty()).then(|| (name.to_string(), spec.location.clone()))
            })
            .collect();
        Self { declared }
    }
}

impl LocationOracle for DeclaredLocations {
    fn locate(&self, names: &[TaskName]) -> HashMap<TaskName, Vec<Host>> {
        names
            .iter()
            .filter_map(|n| self.declared.get(n).map(|hosts| (n.clone(), hosts.clone())))
            .collect()
    }
}

/// Local-disk model: an artifact lives on the host that produced it.
#[derive(Debug, Default)]
pub struct ExecHostLocations {
    seen: Mutex<HashMap<TaskName, Host>>,
}

impl ExecHostLocations {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationOracle for ExecHostLocations {
    fn locate(&self, names: &[TaskName]) -> HashMap<TaskName, Vec<Host>> {
        let seen = self.seen.lock();
        names
            .iter()
            .filter_map(|n| seen.get(n).map(|h| (n.clone(), vec![h.clone()])))
            .collect()
    }

    fn observe(&self, name: &str, host: &str) {
        self.seen.lock().insert(name.to_string(), host.to_string());
    }
}
