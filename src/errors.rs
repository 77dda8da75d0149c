// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum HostdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A prerequisite chain that leads back to one of its own members.
    ///
    /// `chain` is the full invocation path, ending with the repeated task.
    #[error("Cycle detected in DAG: {}", chain.join(" => "))]
    DagCycle { chain: Vec<TaskName> },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Task '{task}' failed: {reason}")]
    TaskFailed { task: TaskName, reason: String },

    #[error("Task '{0}' marked finished with unfinished prerequisites")]
    PrematureFinish(TaskName),

    #[error("Run stalled with unfinished targets: {0:?}")]
    Stalled(Vec<TaskName>),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Profile error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HostdagError>;
