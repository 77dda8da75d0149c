// src/dag/search.rs

//! Dependency search and completion protocol.
//!
//! `search` walks from a requested target down through its prerequisites,
//! registering each requester as a dependent of the node it reaches. The
//! first requester to reach a node runs that node's own prerequisite search;
//! later requesters only register. A node is pushed to the ready queue
//! exactly once, by whichever of these happens last:
//!
//! - its search finds every prerequisite already finished
//! - a prerequisite's completion callback resolves the last open edge
//!
//! No node lock is held across the recursion, so the search and completion
//! paths only ever hold one node lock at a time.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::dag::graph::TaskGraph;
use crate::dag::node::{SearchEntry, TaskNode};
use crate::errors::{HostdagError, Result};
use crate::types::{TaskArgs, TaskName};

/// Destination for nodes whose prerequisites are all finished.
pub trait ReadyQueue: Send + Sync {
    /// `origin` is the host of the worker whose completion released the
    /// nodes, or `None` when they became ready during a search.
    fn push_ready(&self, ready: Vec<Arc<TaskNode>>, origin: Option<&str>);
}

pub struct DagSearch<'a> {
    graph: &'a TaskGraph,
    ready: &'a dyn ReadyQueue,
}

impl<'a> DagSearch<'a> {
    pub fn new(graph: &'a TaskGraph, ready: &'a dyn ReadyQueue) -> Self {
        Self { graph, ready }
    }

    /// Top-level search for `target`.
    ///
    /// Returns `true` if the target had already finished.
    pub fn invoke(&self, target: &str, args: &TaskArgs) -> Result<bool> {
        let node = self.graph.node(target)?;
        let start = Instant::now();
        let finished = self.search(&node, None, args, &[])?;
        info!(
            target,
            elapsed_s = start.elapsed().as_secs_f64(),
            materialised = self.graph.materialised(),
            "search finished"
        );
        Ok(finished)
    }

    /// Register `requester` on `node` and run the node's own search if this
    /// is the first visit. `chain` is the path of ancestors that led here.
    fn search(
        &self,
        node: &Arc<TaskNode>,
        requester: Option<&Arc<TaskNode>>,
        args: &TaskArgs,
        chain: &[TaskName],
    ) -> Result<bool> {
        let mut new_chain = chain.to_vec();
        new_chain.push(node.name().to_string());
        if chain.iter().any(|name| name == node.name()) {
            return Err(HostdagError::DagCycle { chain: new_chain });
        }

        match node.enter_search(requester, args) {
            SearchEntry::AlreadyFinished => {
                debug!(task = %node.name(), "search: already finished");
                return Ok(true);
            }
            SearchEntry::AlreadySearched => {
                debug!(
                    task = %node.name(),
                    requester = requester.map(|r| r.name()),
                    "search: already searched; registered dependent"
                );
                return Ok(false);
            }
            SearchEntry::FirstVisit => {}
        }

        debug!(
            task = %node.name(),
            id = node.id(),
            prerequisites = node.prerequisites().len(),
            "search: first visit"
        );

        for prereq_name in node.prerequisites() {
            let prereq = self.graph.node(prereq_name).map_err(|_| {
                HostdagError::TaskNotFound(format!(
                    "{prereq_name} (required by {})",
                    new_chain.join(" => ")
                ))
            })?;
            if self.search(&prereq, Some(node), args, &new_chain)? && node.resolve(prereq_name) {
                self.push(node, None);
            }
        }

        if node.try_mark_ready() {
            self.push(node, None);
        }
        Ok(false)
    }

    fn push(&self, node: &Arc<TaskNode>, origin: Option<&str>) {
        debug!(task = %node.name(), "ready; pushing to queue");
        self.ready.push_ready(vec![Arc::clone(node)], origin);
    }

    /// Completion callback: mark `node` finished and resolve its edge on every
    /// registered dependent. Dependents that became ready are pushed to the
    /// queue together and also returned.
    pub fn on_finished(&self, node: &Arc<TaskNode>, origin: Option<&str>) -> Result<Vec<Arc<TaskNode>>> {
        let dependents = node.finish()?;
        let ready: Vec<Arc<TaskNode>> = dependents
            .into_iter()
            .filter(|dep| dep.resolve(node.name()))
            .collect();

        debug!(
            task = %node.name(),
            released = ?ready.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "finished; resolved dependents"
        );

        if !ready.is_empty() {
            self.ready.push_ready(ready.clone(), origin);
        }
        Ok(ready)
    }
}
