// src/exec/shell.rs

//! Local shell and dry-run executors.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::exec::backend::{ExecOutcome, Executor, Job};

/// Runs each task's `cmd` with `sh -c` on the local machine.
///
/// The command sees `HOSTDAG_TASK`, `HOSTDAG_HOST`, `HOSTDAG_WORKER` and one
/// `HOSTDAG_ARG_<NAME>` variable per invocation argument. Stdout is
/// inherited; stderr is forwarded to the log at debug level. Tasks without a
/// command succeed immediately.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for ShellExecutor {
    fn execute(&self, job: &Job<'_>) -> Result<ExecOutcome> {
        let Some(cmd_line) = job.cmd() else {
            debug!(task = %job.name(), "no action; nothing to run");
            return Ok(ExecOutcome::Success);
        };

        info!(task = %job.name(), host = %job.host, worker = job.worker, cmd = %cmd_line, "** Execute");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd_line);
            c
        };

        cmd.env("HOSTDAG_TASK", job.name())
            .env("HOSTDAG_HOST", job.host)
            .env("HOSTDAG_WORKER", job.worker.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped());
        for (k, v) in job.args.iter() {
            cmd.env(format!("HOSTDAG_ARG_{}", k.to_uppercase()), v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", job.name()))?;

        if let Some(stderr) = child.stderr.take() {
            for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                debug!(task = %job.name(), "stderr: {}", line);
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("waiting for process of task '{}'", job.name()))?;
        let code = status.code().unwrap_or(-1);

        debug!(task = %job.name(), exit_code = code, success = status.success(), "task process exited");

        Ok(if status.success() {
            ExecOutcome::Success
        } else {
            ExecOutcome::Failed(code)
        })
    }
}

/// Logs what would run and reports success.
#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn execute(&self, job: &Job<'_>) -> Result<ExecOutcome> {
        info!(
            task = %job.name(),
            host = %job.host,
            cmd = job.cmd().unwrap_or(""),
            "** Execute (dry run)"
        );
        Ok(ExecOutcome::Success)
    }
}
