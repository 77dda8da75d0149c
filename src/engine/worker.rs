// src/engine/worker.rs

//! Worker threads.
//!
//! Each worker is bound to one host slot from the cluster's core list and
//! loops: dequeue, execute outside any scheduler lock, then report. The
//! retry counter passed to `dequeue` grows with every empty dequeue and
//! resets after a successful one.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::dag::{DagSearch, TaskNode};
use crate::engine::control::RunControl;
use crate::events::{DequeueKind, EventSink, SchedEvent};
use crate::exec::{ExecOutcome, Executor, Job, LocationOracle};
use crate::profile::{ExecRecord, Profiler};
use crate::queue::LocalityAwareQueue;
use crate::types::{Host, TaskName};

/// Per-worker execution context, passed explicitly instead of living in
/// thread-local state.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub id: usize,
    pub host: Host,
    /// Task currently being executed.
    pub current: Option<TaskName>,
}

impl WorkerContext {
    pub fn new(id: usize, host: Host) -> Self {
        Self {
            id,
            host,
            current: None,
        }
    }
}

/// Execution counters by the tier a node was taken from. Nodes without
/// hints count toward `executed` only.
#[derive(Debug, Default)]
pub struct LocalityStats {
    pub executed: AtomicUsize,
    pub local: AtomicUsize,
    pub remote: AtomicUsize,
    pub stolen: AtomicUsize,
}

impl LocalityStats {
    fn count(&self, kind: &DequeueKind) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        let counter = match kind {
            DequeueKind::NoHint => return,
            DequeueKind::Local => &self.local,
            DequeueKind::Remote => &self.remote,
            DequeueKind::Steal { .. } => &self.stolen,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Everything workers share for the duration of one run.
pub(crate) struct WorkerShared<'a> {
    pub queue: &'a LocalityAwareQueue,
    pub search: &'a DagSearch<'a>,
    pub control: &'a RunControl,
    pub executor: &'a dyn Executor,
    pub oracle: &'a dyn LocationOracle,
    pub sink: &'a dyn EventSink,
    pub profiler: Option<&'a Profiler>,
    pub stats: &'a LocalityStats,
}

pub(crate) fn run_worker(mut ctx: WorkerContext, shared: &WorkerShared<'_>) {
    debug!(worker = ctx.id, host = %ctx.host, "worker started");
    let mut retry: u32 = 0;

    loop {
        if shared.queue.is_closed() || shared.control.should_stop() {
            break;
        }
        match shared.queue.dequeue(&ctx.host, retry) {
            Some((node, kind)) => {
                retry = 0;
                execute_node(&mut ctx, shared, &node, &kind);
                shared.queue.task_done();
                shared.control.report_done();
            }
            None => retry = retry.saturating_add(1),
        }
    }

    debug!(worker = ctx.id, host = %ctx.host, "worker exiting");
}

fn execute_node(ctx: &mut WorkerContext, shared: &WorkerShared<'_>, node: &Arc<TaskNode>, kind: &DequeueKind) {
    if !node.mark_invoked() {
        warn!(task = %node.name(), worker = ctx.id, "node dequeued twice; skipping");
        return;
    }
    ctx.current = Some(node.name().to_string());
    shared.stats.count(kind);

    let args = node.args();
    let job = Job {
        node: node.as_ref(),
        args: &args,
        host: &ctx.host,
        worker: ctx.id,
    };

    let started_at = Local::now();
    let start = Instant::now();
    let outcome = shared.executor.execute(&job);
    let elapsed_s = start.elapsed().as_secs_f64();

    if let Some(profiler) = shared.profiler {
        profiler.record(&ExecRecord {
            task_id: node.id(),
            task_name: node.name(),
            command: job.cmd().unwrap_or(""),
            host: &ctx.host,
            start: started_at,
            end: Local::now(),
            exit_code: match &outcome {
                Ok(ExecOutcome::Success) => Some(0),
                Ok(ExecOutcome::Failed(code)) => Some(*code),
                Err(_) => None,
            },
        });
    }

    let failure = match outcome {
        Ok(ExecOutcome::Success) => {
            shared.sink.record(&SchedEvent::Executed {
                task: node.name().to_string(),
                host: ctx.host.clone(),
                worker: ctx.id,
                elapsed_s,
            });
            complete(ctx, shared, node).err()
        }
        Ok(ExecOutcome::Failed(code)) => Some(format!("exit code {code}")),
        Err(e) => Some(format!("{e:#}")),
    };

    if let Some(reason) = failure {
        node.mark_failed(reason.clone());
        shared.sink.record(&SchedEvent::Failed {
            task: node.name().to_string(),
            host: ctx.host.clone(),
            reason: reason.clone(),
        });
        shared.control.report_failure(node.name(), &reason);
    }
    ctx.current = None;
}

/// Record where the artifact now lives and resolve dependents. Tasks without
/// an action produced nothing here, so only tasks with a command are
/// reported to the oracle.
fn complete(ctx: &WorkerContext, shared: &WorkerShared<'_>, node: &Arc<TaskNode>) -> Result<(), String> {
    if node.spec().cmd.is_some() {
        shared.oracle.observe(node.name(), &ctx.host);
    }
    let name = node.name().to_string();
    let located = shared
        .oracle
        .locate(std::slice::from_ref(&name))
        .remove(&name)
        .filter(|hosts| !hosts.is_empty())
        .unwrap_or_else(|| node.spec().location.clone());
    node.set_location(located);

    let released = shared
        .search
        .on_finished(node, Some(&ctx.host))
        .map_err(|e| e.to_string())?;
    info!(
        task = %node.name(),
        host = %ctx.host,
        worker = ctx.id,
        released = released.len(),
        "finished"
    );
    Ok(())
}
