// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::PlacementStrategy;

/// Configuration file exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// hostfile = "hosts"
/// halt_queue_while_search = false
///
/// [[affinity]]
/// a = "c1.example"
/// b = "c2.example"
/// score = 0.4
///
/// [task.link]
/// cmd = "cc -o app a.o b.o"
/// after = ["a.o", "b.o"]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub affinity: Vec<AffinityEntry>,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub affinity: Vec<AffinityEntry>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        affinity: Vec<AffinityEntry>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            affinity,
            task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigSection {
    /// Hostfile with `host [ncore [group]]` lines. Excludes `num_threads`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostfile: Option<PathBuf>,

    /// Number of local workers when no hostfile is given (default 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,

    #[serde(default)]
    pub disable_steal: bool,

    /// Queue everything without placement hints.
    #[serde(default)]
    pub disable_affinity: bool,

    /// Stage all enqueues while a top-level search runs.
    #[serde(default)]
    pub halt_queue_while_search: bool,

    /// Keep running unrelated work after a task fails.
    #[serde(default)]
    pub keep_going: bool,

    #[serde(default)]
    pub placement: PlacementStrategy,

    /// CSV profile output path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<PathBuf>,

    #[serde(default = "default_base_wait_ms")]
    pub base_wait_ms: u64,

    #[serde(default = "default_max_backoff_level")]
    pub max_backoff_level: u32,

    /// Targets used when none are given on the command line.
    #[serde(default)]
    pub default: Vec<String>,
}

fn default_base_wait_ms() -> u64 {
    50
}

fn default_max_backoff_level() -> u32 {
    10
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            hostfile: None,
            num_threads: None,
            disable_steal: false,
            disable_affinity: false,
            halt_queue_while_search: false,
            keep_going: false,
            placement: PlacementStrategy::default(),
            profile: None,
            base_wait_ms: default_base_wait_ms(),
            max_backoff_level: default_max_backoff_level(),
            default: Vec::new(),
        }
    }
}

/// `[[affinity]]` entry: explicit throughput score for a host or domain pair.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AffinityEntry {
    pub a: String,
    pub b: String,
    pub score: f64,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskConfig {
    /// Command to run; omit for tasks that only stand for existing data.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Prerequisites: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Hosts known to hold this task's artifact.
    #[serde(default)]
    pub location: Vec<String>,

    /// Artifact size, weighed when deriving placement hints.
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_size() -> u64 {
    1
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cmd: None,
            after: Vec::new(),
            location: Vec::new(),
            size: default_size(),
        }
    }
}
