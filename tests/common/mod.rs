#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hostdag::config::Cluster;
use hostdag::dag::{TaskGraph, TaskNode};
use hostdag::events::TracingSink;
use hostdag::queue::{AffinityTable, LocalityAwareQueue, QueueOptions};

pub use hostdag_test_utils::builders;
pub use hostdag_test_utils::{FakeExecutor, RecordingQueue, RecordingSink, init_tracing};

/// Queue over `hosts` with a short backoff so empty dequeues return fast.
pub fn fast_queue(hosts: &[&str], enable_steal: bool) -> LocalityAwareQueue {
    let hosts: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
    LocalityAwareQueue::new(
        &hosts,
        AffinityTable::default(),
        QueueOptions {
            enable_steal,
            base_wait: Duration::from_millis(1),
            max_backoff_level: 2,
        },
        Arc::new(TracingSink),
    )
}

/// Materialise one node per name from a graph without prerequisites.
pub fn nodes(names: &[&str]) -> (TaskGraph, Vec<Arc<TaskNode>>) {
    let no_prereqs: &[&str] = &[];
    let edges: Vec<(&str, &[&str])> = names.iter().map(|n| (*n, no_prereqs)).collect();
    let graph = builders::graph_of(&edges);
    let nodes = names
        .iter()
        .map(|n| graph.node(n).expect("node exists"))
        .collect();
    (graph, nodes)
}

pub fn hints(hosts: &[&str]) -> Vec<String> {
    hosts.iter().map(|h| h.to_string()).collect()
}

pub fn cluster(hostfile: &str) -> Cluster {
    Cluster::parse_hostfile(hostfile).expect("valid hostfile")
}

/// Fast backoff for end-to-end runs.
pub fn fast_options(enable_steal: bool) -> QueueOptions {
    QueueOptions {
        enable_steal,
        base_wait: Duration::from_millis(2),
        max_backoff_level: 3,
    }
}
