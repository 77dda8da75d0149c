// src/types.rs

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Host name as it appears in the hostfile (or `"localhost"`).
pub type Host = String;

/// Named invocation arguments, captured when a target is searched and
/// propagated unchanged to all of its prerequisites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskArgs {
    values: BTreeMap<String, String>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromStr for TaskArgs {
    type Err = String;

    /// Parse a comma separated `key=value` list, e.g. `"mode=fast,n=3"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = TaskArgs::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = pair
                .split_once('=')
                .ok_or_else(|| format!("invalid task argument '{pair}' (expected key=value)"))?;
            if k.trim().is_empty() {
                return Err(format!("invalid task argument '{pair}' (empty key)"));
            }
            args.values.insert(k.trim().to_string(), v.trim().to_string());
        }
        Ok(args)
    }
}

/// How placement hints are derived from a node's prerequisites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Hosts that hold at least half as much input data as the best host.
    Majority,
    /// Wherever the first prerequisite's artifact lives.
    FirstPrerequisite,
}

impl Default for PlacementStrategy {
    fn default() -> Self {
        PlacementStrategy::Majority
    }
}

impl FromStr for PlacementStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "majority" => Ok(PlacementStrategy::Majority),
            "first_prerequisite" | "first" => Ok(PlacementStrategy::FirstPrerequisite),
            other => Err(format!(
                "invalid placement: {other} (expected \"majority\" or \"first_prerequisite\")"
            )),
        }
    }
}
