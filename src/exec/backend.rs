// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! Workers hand every dequeued node to an [`Executor`]. Production code
//! uses [`ShellExecutor`](super::shell::ShellExecutor); tests provide their
//! own implementation that records calls instead of spawning processes.

use anyhow::Result;

use crate::dag::TaskNode;
use crate::types::{Host, TaskArgs};

/// Outcome of running a task's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Failed(i32),
}

/// Everything an executor gets to see about one execution.
#[derive(Debug, Clone, Copy)]
pub struct Job<'a> {
    pub node: &'a TaskNode,
    pub args: &'a TaskArgs,
    /// Host of the worker running the job.
    pub host: &'a Host,
    pub worker: usize,
}

impl Job<'_> {
    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn cmd(&self) -> Option<&str> {
        self.node.spec().cmd.as_deref()
    }
}

/// Runs task actions. Called from worker threads with no scheduler lock
/// held; an `Err` is treated like a failed outcome.
pub trait Executor: Send + Sync {
    fn execute(&self, job: &Job<'_>) -> Result<ExecOutcome>;
}
