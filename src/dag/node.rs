// src/dag/node.rs

//! Per-vertex scheduling state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::{HostdagError, Result};
use crate::types::{Host, TaskArgs, TaskName};

/// Static description of a task: identity, prerequisites and the executor
/// payload, which the scheduler never interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: TaskName,
    /// Ordered prerequisite names (`after = [...]`).
    pub prerequisites: Vec<TaskName>,
    /// Shell command; `None` means the task has no action (e.g. a source file).
    pub cmd: Option<String>,
    /// Size of the produced artifact, used to weigh placement.
    pub size: u64,
    /// Hosts declared to hold the produced artifact.
    pub location: Vec<Host>,
}

impl TaskSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            prerequisites: Vec::new(),
            cmd: None,
            size: 1,
            location: Vec::new(),
        }
    }

    pub fn after(mut self, prereq: &str) -> Self {
        self.prerequisites.push(prereq.to_string());
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.cmd = Some(cmd.to_string());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn located_on(mut self, host: &str) -> Self {
        self.location.push(host.to_string());
        self
    }
}

/// Coarse lifecycle view of a node, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Nobody has searched this node yet.
    Unsearched,
    /// Searched; waiting for prerequisites.
    Waiting,
    /// Pushed to the ready queue; no worker has picked it up.
    Queued,
    /// A worker is executing it.
    Running,
    Finished,
    Failed,
}

/// Outcome of registering a requester on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SearchEntry {
    /// Node already finished; the requester was not registered.
    AlreadyFinished,
    /// Requester registered; the node's own search already ran.
    AlreadySearched,
    /// Requester registered and this caller owns the node's search.
    FirstVisit,
}

#[derive(Default)]
struct NodeState {
    searched: bool,
    enqueued: bool,
    invoked: bool,
    finished: bool,
    failed: Option<String>,
    /// Prerequisites not yet reported finished, keyed by name so a repeated
    /// report for the same edge is a no-op.
    unfinished: HashSet<TaskName>,
    /// Nodes that listed this one as a prerequisite. Frozen once finished.
    dependents: Vec<Arc<TaskNode>>,
    /// Host tiers this node was queued on.
    assigned: Vec<Host>,
    location: Vec<Host>,
    args: Option<TaskArgs>,
}

/// One DAG vertex. All mutable fields sit behind the node's own lock, which
/// is never held while another node's lock is taken.
pub struct TaskNode {
    id: u64,
    spec: TaskSpec,
    state: Mutex<NodeState>,
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("name", &self.spec.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl TaskNode {
    pub(crate) fn new(id: u64, spec: TaskSpec) -> Self {
        let location = spec.location.clone();
        Self {
            id,
            spec,
            state: Mutex::new(NodeState {
                location,
                ..NodeState::default()
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub fn prerequisites(&self) -> &[TaskName] {
        &self.spec.prerequisites
    }

    pub fn status(&self) -> NodeStatus {
        let st = self.state.lock();
        if st.failed.is_some() {
            NodeStatus::Failed
        } else if st.finished {
            NodeStatus::Finished
        } else if st.invoked {
            NodeStatus::Running
        } else if st.enqueued {
            NodeStatus::Queued
        } else if st.searched {
            NodeStatus::Waiting
        } else {
            NodeStatus::Unsearched
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    pub fn failure(&self) -> Option<String> {
        self.state.lock().failed.clone()
    }

    pub fn unfinished_count(&self) -> usize {
        self.state.lock().unfinished.len()
    }

    pub fn dependent_names(&self) -> Vec<TaskName> {
        self.state
            .lock()
            .dependents
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }

    /// Hosts this node was queued on (empty for unassigned/remote work).
    pub fn assigned(&self) -> Vec<Host> {
        self.state.lock().assigned.clone()
    }

    /// Hosts believed to hold this node's artifact.
    pub fn location(&self) -> Vec<Host> {
        self.state.lock().location.clone()
    }

    pub fn set_location(&self, hosts: Vec<Host>) {
        self.state.lock().location = hosts;
    }

    /// Arguments captured by the first search of this node.
    pub fn args(&self) -> TaskArgs {
        self.state.lock().args.clone().unwrap_or_default()
    }

    /// Register `requester` as a dependent and claim the node's own search if
    /// nobody has yet.
    pub(crate) fn enter_search(&self, requester: Option<&Arc<TaskNode>>, args: &TaskArgs) -> SearchEntry {
        let mut st = self.state.lock();
        if st.finished {
            return SearchEntry::AlreadyFinished;
        }
        if let Some(req) = requester {
            st.dependents.push(Arc::clone(req));
        }
        if st.searched {
            return SearchEntry::AlreadySearched;
        }
        st.searched = true;
        st.args = Some(args.clone());
        st.unfinished = self.spec.prerequisites.iter().cloned().collect();
        SearchEntry::FirstVisit
    }

    /// Record that prerequisite `prereq` finished. Only the first report for
    /// a given prerequisite has any effect.
    ///
    /// Returns `true` if this call made the node ready; the caller must then
    /// enqueue it.
    pub fn resolve(&self, prereq: &str) -> bool {
        let mut st = self.state.lock();
        if !st.unfinished.remove(prereq) {
            return false;
        }
        Self::claim_ready(&mut st)
    }

    /// Returns `true` exactly once: the first time the node is searched with
    /// no unfinished prerequisites left.
    pub(crate) fn try_mark_ready(&self) -> bool {
        let mut st = self.state.lock();
        Self::claim_ready(&mut st)
    }

    fn claim_ready(st: &mut NodeState) -> bool {
        if st.searched && !st.enqueued && st.unfinished.is_empty() {
            st.enqueued = true;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_assigned(&self, hosts: Vec<Host>) {
        self.state.lock().assigned = hosts;
    }

    /// Claim execution. Returns `false` if the node was already invoked.
    pub(crate) fn mark_invoked(&self) -> bool {
        let mut st = self.state.lock();
        if st.invoked {
            return false;
        }
        st.invoked = true;
        true
    }

    pub(crate) fn mark_failed(&self, reason: String) {
        self.state.lock().failed = Some(reason);
    }

    /// Mark finished and hand back the dependent list, which can no longer
    /// grow. A second call returns an empty list.
    pub(crate) fn finish(&self) -> Result<Vec<Arc<TaskNode>>> {
        let mut st = self.state.lock();
        if st.finished {
            return Ok(Vec::new());
        }
        let unsearched_with_prereqs = !st.searched && !self.spec.prerequisites.is_empty();
        if unsearched_with_prereqs || !st.unfinished.is_empty() {
            return Err(HostdagError::PrematureFinish(self.spec.name.clone()));
        }
        st.finished = true;
        Ok(st.dependents.clone())
    }
}
