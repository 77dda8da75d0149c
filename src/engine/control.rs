// src/engine/control.rs

//! Run termination monitor.
//!
//! Workers report completions and failures here; the driver thread blocks in
//! [`RunControl::wait`] until the run reaches a terminal state. The queue
//! itself has no notion of global completion, so the driver also checks
//! whether the queue has drained while targets are still unfinished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::dag::TaskNode;
use crate::queue::LocalityAwareQueue;
use crate::types::TaskName;

/// Interval at which the driver re-checks drain and cancellation even if no
/// worker reported anything.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cloneable handle that cancels a running scheduler.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
    /// Every target finished.
    Completed,
    /// A task failed; carries the failures in the order they were reported.
    Failed(Vec<(TaskName, String)>),
    /// Queue drained with these targets unfinished and no failure recorded.
    Stalled(Vec<TaskName>),
    Cancelled,
}

#[derive(Default)]
struct ControlState {
    failures: Vec<(TaskName, String)>,
    /// Reports received so far.
    reports: u64,
}

impl std::fmt::Debug for ControlState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlState")
            .field("failures", &self.failures.len())
            .field("reports", &self.reports)
            .finish()
    }
}

#[derive(Debug)]
pub struct RunControl {
    state: Mutex<ControlState>,
    cv: Condvar,
    keep_going: bool,
    cancel: CancelHandle,
}

impl RunControl {
    pub fn new(keep_going: bool, cancel: CancelHandle) -> Self {
        Self {
            state: Mutex::new(ControlState::default()),
            cv: Condvar::new(),
            keep_going,
            cancel,
        }
    }

    /// A worker finished handling a node, successfully or not.
    pub fn report_done(&self) {
        self.state.lock().reports += 1;
        self.cv.notify_all();
    }

    pub fn report_failure(&self, task: &str, reason: &str) {
        {
            let mut st = self.state.lock();
            st.failures.push((task.to_string(), reason.to_string()));
            st.reports += 1;
        }
        warn!(task, reason, keep_going = self.keep_going, "task failure reported");
        self.cv.notify_all();
    }

    pub fn has_failures(&self) -> bool {
        !self.state.lock().failures.is_empty()
    }

    /// Workers stop taking new work once this is true.
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || (!self.keep_going && self.has_failures())
    }

    /// Block until the run is over.
    pub fn wait(&self, targets: &[Arc<TaskNode>], queue: &LocalityAwareQueue) -> RunEnd {
        let mut st = self.state.lock();
        loop {
            if self.cancel.is_cancelled() {
                debug!("run cancelled");
                return RunEnd::Cancelled;
            }
            if !st.failures.is_empty() && !self.keep_going {
                return RunEnd::Failed(st.failures.clone());
            }
            if targets.iter().all(|t| t.is_finished()) {
                return RunEnd::Completed;
            }
            if queue.is_drained() {
                if !st.failures.is_empty() {
                    return RunEnd::Failed(st.failures.clone());
                }
                let unfinished: Vec<TaskName> = targets
                    .iter()
                    .filter(|t| !t.is_finished())
                    .map(|t| t.name().to_string())
                    .collect();
                return RunEnd::Stalled(unfinished);
            }
            self.cv.wait_for(&mut st, POLL_INTERVAL);
        }
    }
}
