// tests/dag_search.rs

mod common;
use crate::common::builders::graph_of;
use crate::common::{RecordingQueue, init_tracing};

use std::collections::HashSet;
use std::thread;

use hostdag::dag::{DagSearch, NodeStatus, TaskGraph, TaskSpec};
use hostdag::errors::HostdagError;
use hostdag::types::TaskArgs;

fn fan_in() -> TaskGraph {
    // C depends on A and B.
    graph_of(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])])
}

#[test]
fn search_enqueues_leaves_then_dependent_after_both_finish() {
    init_tracing();
    let graph = fan_in();
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);

    let finished = search.invoke("C", &TaskArgs::new()).unwrap();
    assert!(!finished);
    assert_eq!(queue.names(), vec!["A", "B"]);

    let c = graph.node("C").unwrap();
    assert_eq!(c.status(), NodeStatus::Waiting);
    assert_eq!(c.unfinished_count(), 2);

    let a = graph.node("A").unwrap();
    let released = search.on_finished(&a, Some("h1")).unwrap();
    assert!(released.is_empty());
    assert_eq!(c.unfinished_count(), 1);

    let b = graph.node("B").unwrap();
    let released = search.on_finished(&b, Some("h2")).unwrap();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].name(), "C");

    assert_eq!(queue.names(), vec!["A", "B", "C"]);
    assert_eq!(queue.origins()[2].as_deref(), Some("h2"));
    assert_eq!(c.status(), NodeStatus::Queued);
}

#[test]
fn dependents_are_recorded_on_prerequisites() {
    let graph = fan_in();
    let queue = RecordingQueue::new();
    DagSearch::new(&graph, &queue)
        .invoke("C", &TaskArgs::new())
        .unwrap();

    assert_eq!(graph.node("A").unwrap().dependent_names(), vec!["C"]);
    assert_eq!(graph.node("B").unwrap().dependent_names(), vec!["C"]);
}

#[test]
fn cycle_reports_full_chain_and_enqueues_nothing() {
    let graph = graph_of(&[("top", &["A"]), ("A", &["B"]), ("B", &["A"])]);
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);

    match search.invoke("top", &TaskArgs::new()) {
        Err(HostdagError::DagCycle { chain }) => {
            assert_eq!(chain, vec!["top", "A", "B", "A"]);
        }
        other => panic!("expected DagCycle, got {other:?}"),
    }
    assert!(queue.names().is_empty());
}

#[test]
fn static_cycle_finder_matches_search_chain() {
    let graph = graph_of(&[("top", &["A"]), ("A", &["B"]), ("B", &["A"])]);
    assert_eq!(
        graph.find_cycle("top").unwrap(),
        Some(vec!["top".into(), "A".into(), "B".into(), "A".into()])
    );
    assert_eq!(fan_in().find_cycle("C").unwrap(), None);
    assert_eq!(graph.materialised(), 0);
}

#[test]
fn missing_prerequisite_is_task_not_found() {
    let graph = TaskGraph::new([TaskSpec::new("app").after("ghost")]);
    let queue = RecordingQueue::new();
    let err = DagSearch::new(&graph, &queue)
        .invoke("app", &TaskArgs::new())
        .unwrap_err();
    match err {
        HostdagError::TaskNotFound(msg) => {
            assert!(msg.contains("ghost"));
            assert!(msg.contains("app"));
        }
        other => panic!("expected TaskNotFound, got {other:?}"),
    }
}

#[test]
fn repeated_resolution_of_same_edge_counts_once() {
    let graph = fan_in();
    let queue = RecordingQueue::new();
    DagSearch::new(&graph, &queue)
        .invoke("C", &TaskArgs::new())
        .unwrap();

    let c = graph.node("C").unwrap();
    assert!(!c.resolve("A"));
    assert!(!c.resolve("A"));
    assert_eq!(c.unfinished_count(), 1);

    assert!(c.resolve("B"));
    // Already claimed for the queue.
    assert!(!c.resolve("B"));
}

#[test]
fn completion_callback_twice_releases_dependent_once() {
    let graph = graph_of(&[("A", &[]), ("B", &["A"])]);
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);
    search.invoke("B", &TaskArgs::new()).unwrap();

    let a = graph.node("A").unwrap();
    assert_eq!(search.on_finished(&a, None).unwrap().len(), 1);
    assert!(search.on_finished(&a, None).unwrap().is_empty());
    assert_eq!(queue.names(), vec!["A", "B"]);
}

#[test]
fn finishing_before_prerequisites_is_an_error() {
    let graph = fan_in();
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);
    search.invoke("C", &TaskArgs::new()).unwrap();

    let c = graph.node("C").unwrap();
    match search.on_finished(&c, None) {
        Err(HostdagError::PrematureFinish(name)) => assert_eq!(name, "C"),
        other => panic!("expected PrematureFinish, got {other:?}"),
    }
    assert!(!c.is_finished());
}

#[test]
fn late_requester_sees_finished_prerequisite() {
    let graph = graph_of(&[("A", &[]), ("B", &["A"]), ("D", &["A"])]);
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);

    search.invoke("B", &TaskArgs::new()).unwrap();
    let a = graph.node("A").unwrap();
    search.on_finished(&a, None).unwrap();
    assert!(search.invoke("A", &TaskArgs::new()).unwrap());

    // D is ready immediately and A is not registered to release it again.
    search.invoke("D", &TaskArgs::new()).unwrap();
    assert_eq!(queue.names(), vec!["A", "B", "D"]);
    assert_eq!(a.dependent_names(), vec!["B"]);
}

#[test]
fn shared_prerequisite_is_enqueued_once() {
    let graph = graph_of(&[
        ("A", &[]),
        ("B", &["A"]),
        ("C", &["A"]),
        ("D", &["B", "C"]),
    ]);
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);
    search.invoke("D", &TaskArgs::new()).unwrap();
    assert_eq!(queue.names(), vec!["A"]);

    let a = graph.node("A").unwrap();
    let released: Vec<String> = search
        .on_finished(&a, None)
        .unwrap()
        .iter()
        .map(|n| n.name().to_string())
        .collect();
    assert_eq!(released, vec!["B", "C"]);
}

#[test]
fn invocation_arguments_reach_prerequisites() {
    let graph = fan_in();
    let queue = RecordingQueue::new();
    let args = TaskArgs::new().with("mode", "fast");
    DagSearch::new(&graph, &queue).invoke("C", &args).unwrap();

    for name in ["A", "B", "C"] {
        assert_eq!(graph.node(name).unwrap().args().get("mode"), Some("fast"));
    }
}

#[test]
fn node_ids_follow_materialisation_order() {
    let graph = fan_in();
    let queue = RecordingQueue::new();
    DagSearch::new(&graph, &queue)
        .invoke("C", &TaskArgs::new())
        .unwrap();
    let ids: Vec<u64> = ["C", "A", "B"]
        .iter()
        .map(|n| graph.existing(n).unwrap().id())
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn concurrent_searches_enqueue_each_node_once() {
    init_tracing();
    // 8 top-level targets share one wide layer of 16 leaves.
    let mut specs: Vec<TaskSpec> = (0..16).map(|i| TaskSpec::new(&format!("leaf{i}"))).collect();
    for t in 0..8 {
        let mut spec = TaskSpec::new(&format!("top{t}"));
        for i in 0..16 {
            spec = spec.after(&format!("leaf{i}"));
        }
        specs.push(spec);
    }
    let graph = TaskGraph::new(specs);
    let queue = RecordingQueue::new();
    let search = DagSearch::new(&graph, &queue);

    thread::scope(|s| {
        for t in 0..8 {
            let search = &search;
            s.spawn(move || {
                search.invoke(&format!("top{t}"), &TaskArgs::new()).unwrap();
            });
        }
    });

    let names = queue.names();
    let distinct: HashSet<&String> = names.iter().collect();
    assert_eq!(names.len(), 16);
    assert_eq!(distinct.len(), 16);

    // Finish leaves from several threads; every top is released exactly once.
    let leaves = queue.drain();
    thread::scope(|s| {
        for chunk in leaves.chunks(4) {
            let search = &search;
            s.spawn(move || {
                for leaf in chunk {
                    search.on_finished(leaf, None).unwrap();
                }
            });
        }
    });
    let mut tops = queue.names();
    tops.sort();
    let expected: Vec<String> = {
        let mut v: Vec<String> = (0..8).map(|t| format!("top{t}")).collect();
        v.sort();
        v
    };
    assert_eq!(tops, expected);
}
