// src/events.rs

//! Structured scheduler events.
//!
//! The queue and the worker pool report what they do through an
//! [`EventSink`]: search starts, enqueues, dequeues and steals, wakeups,
//! and task outcomes. Sinks are called while scheduler locks are held, so an
//! implementation must return quickly and never call back into the
//! scheduler. The default [`TracingSink`] turns events into `tracing`
//! records.

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::types::{Host, TaskName};

/// Where a node went when it was enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// No hints: the shared first-come tier.
    Unassigned,
    /// One copy in each listed host tier.
    Hosts(Vec<Host>),
    /// Hints named no known host.
    Remote,
}

/// Which rule picked a node on dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DequeueKind {
    NoHint,
    Local,
    Remote,
    Steal { from: Host },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchedEvent {
    SearchStarted {
        target: TaskName,
    },
    Enqueued {
        task: TaskName,
        placement: Placement,
    },
    Dequeued {
        task: TaskName,
        host: Host,
        kind: DequeueKind,
        retry: u32,
    },
    /// Parked workers signalled after an enqueue or on close. `hints` is the
    /// preference list handed to the condvar; empty means any waiter.
    Woken {
        hints: Vec<Host>,
        woken: usize,
    },
    Executed {
        task: TaskName,
        host: Host,
        worker: usize,
        elapsed_s: f64,
    },
    Failed {
        task: TaskName,
        host: Host,
        reason: String,
    },
}

pub trait EventSink: Send + Sync + fmt::Debug {
    fn record(&self, event: &SchedEvent);
}

/// Default sink: one `tracing` record per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &SchedEvent) {
        match event {
            SchedEvent::SearchStarted { target } => {
                info!(target = %target, "search start");
            }
            SchedEvent::Enqueued { task, placement } => {
                debug!(task = %task, ?placement, "enqueue");
            }
            SchedEvent::Dequeued {
                task,
                host,
                kind: DequeueKind::Steal { from },
                retry,
            } => {
                info!(task = %task, host = %host, from = %from, retry, "deq_steal");
            }
            SchedEvent::Dequeued {
                task,
                host,
                kind,
                retry,
            } => {
                info!(task = %task, host = %host, ?kind, retry, "dequeue");
            }
            SchedEvent::Woken { hints, woken } => {
                trace!(?hints, woken, "wake");
            }
            SchedEvent::Executed {
                task,
                host,
                worker,
                elapsed_s,
            } => {
                debug!(task = %task, host = %host, worker, elapsed_s, "executed");
            }
            SchedEvent::Failed { task, host, reason } => {
                warn!(task = %task, host = %host, reason = %reason, "task failed");
            }
        }
    }
}
