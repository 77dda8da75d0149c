use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use parking_lot::Mutex;

use hostdag::exec::{ExecOutcome, Executor, Job};

/// One recorded call to [`FakeExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub task: String,
    pub host: String,
    pub worker: usize,
    pub args: Vec<(String, String)>,
}

/// A fake executor that:
/// - records which tasks were "run", where, and with which arguments
/// - fails the tasks it was told to fail (exit code 1)
/// - optionally sleeps to let other workers overlap
#[derive(Debug, Default)]
pub struct FakeExecutor {
    executions: Mutex<Vec<Execution>>,
    failing: HashSet<String>,
    erroring: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `task` exits with code 1.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.insert(task.to_string());
        self
    }

    /// `task` makes the executor itself return an error.
    pub fn erroring(mut self, task: &str) -> Self {
        self.erroring.insert(task.to_string());
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.executions.lock().clone()
    }

    /// Task names in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.executions.lock().iter().map(|e| e.task.clone()).collect()
    }

    pub fn count(&self, task: &str) -> usize {
        self.executions.lock().iter().filter(|e| e.task == task).count()
    }

    pub fn host_of(&self, task: &str) -> Option<String> {
        self.executions
            .lock()
            .iter()
            .find(|e| e.task == task)
            .map(|e| e.host.clone())
    }

    /// Position of `task` in the execution order.
    pub fn position(&self, task: &str) -> Option<usize> {
        self.executions.lock().iter().position(|e| e.task == task)
    }
}

impl Executor for FakeExecutor {
    fn execute(&self, job: &Job<'_>) -> Result<ExecOutcome> {
        self.executions.lock().push(Execution {
            task: job.name().to_string(),
            host: job.host.clone(),
            worker: job.worker,
            args: job
                .args
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });

        let delay = self
            .delays
            .get(job.name())
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        if self.erroring.contains(job.name()) {
            return Err(anyhow!("executor broke while running {}", job.name()));
        }
        if self.failing.contains(job.name()) {
            return Ok(ExecOutcome::Failed(1));
        }
        Ok(ExecOutcome::Success)
    }
}
