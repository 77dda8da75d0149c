// src/engine/dispatch.rs

use std::sync::Arc;

use tracing::trace;

use crate::dag::{ReadyQueue, TaskGraph, TaskNode};
use crate::engine::placement::{DataLocation, PlacementHints};
use crate::queue::LocalityAwareQueue;
use crate::types::Host;

/// Bridges the DAG search to the locality-aware queue: every ready node gets
/// placement hints from its prerequisites' current locations before it is
/// enqueued.
pub struct Dispatcher<'a> {
    graph: &'a TaskGraph,
    queue: &'a LocalityAwareQueue,
    placement: &'a dyn PlacementHints,
    disable_affinity: bool,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        queue: &'a LocalityAwareQueue,
        placement: &'a dyn PlacementHints,
        disable_affinity: bool,
    ) -> Self {
        Self {
            graph,
            queue,
            placement,
            disable_affinity,
        }
    }

    /// Hints for `node`. Empty when affinity is disabled or no prerequisite
    /// location is known.
    pub fn hints_for(&self, node: &TaskNode) -> Vec<Host> {
        if self.disable_affinity {
            return Vec::new();
        }
        let inputs: Vec<DataLocation> = node
            .prerequisites()
            .iter()
            .filter_map(|name| self.graph.existing(name))
            .map(|prereq| DataLocation {
                hosts: prereq.location(),
                size: prereq.spec().size,
            })
            .collect();
        let hints = self.placement.derive(&inputs);
        trace!(task = %node.name(), ?hints, "placement hints");
        hints
    }
}

impl ReadyQueue for Dispatcher<'_> {
    fn push_ready(&self, ready: Vec<Arc<TaskNode>>, origin: Option<&str>) {
        let items: Vec<(Arc<TaskNode>, Vec<Host>)> = ready
            .into_iter()
            .map(|node| {
                let hints = self.hints_for(&node);
                (node, hints)
            })
            .collect();
        self.queue.enqueue_all(items, origin);
    }
}
