// tests/locality_queue.rs

mod common;
use crate::common::{RecordingSink, fast_queue, hints, init_tracing, nodes};

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hostdag::events::{DequeueKind, Placement, SchedEvent};
use hostdag::queue::{AffinityTable, LocalityAwareQueue, QueueOptions};

fn name_of(d: Option<(Arc<hostdag::dag::TaskNode>, DequeueKind)>) -> Option<(String, DequeueKind)> {
    d.map(|(n, k)| (n.name().to_string(), k))
}

#[test]
fn dequeue_priority_is_nohint_local_remote_then_steal() {
    init_tracing();
    let (_g, n) = nodes(&["for_h2", "free", "far", "mine"]);
    let q = fast_queue(&["h1", "h2"], true);

    q.enqueue(n[0].clone(), hints(&["h2"]), None);
    q.enqueue(n[2].clone(), hints(&["elsewhere"]), None);
    q.enqueue(n[3].clone(), hints(&["h1"]), None);
    q.enqueue(n[1].clone(), Vec::new(), None);
    assert_eq!(q.len(), 4);

    assert_eq!(name_of(q.dequeue("h1", 0)), Some(("free".into(), DequeueKind::NoHint)));
    assert_eq!(name_of(q.dequeue("h1", 0)), Some(("mine".into(), DequeueKind::Local)));
    assert_eq!(name_of(q.dequeue("h1", 0)), Some(("far".into(), DequeueKind::Remote)));
    // No steal on the first attempt.
    assert_eq!(name_of(q.dequeue("h1", 0)), None);
    assert_eq!(
        name_of(q.dequeue("h1", 1)),
        Some(("for_h2".into(), DequeueKind::Steal { from: "h2".into() }))
    );
    assert!(q.is_empty());
}

#[test]
fn nohint_tier_is_fifo() {
    let (_g, n) = nodes(&["a", "b", "c"]);
    let q = fast_queue(&["h1"], false);
    for node in &n {
        q.enqueue(node.clone(), Vec::new(), None);
    }
    let order: Vec<String> = (0..3)
        .filter_map(|_| q.dequeue("h1", 0))
        .map(|(n, _)| n.name().to_string())
        .collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn multi_host_node_is_taken_once() {
    let (_g, n) = nodes(&["shared"]);
    let q = fast_queue(&["h1", "h2", "h3"], true);

    q.enqueue(n[0].clone(), hints(&["h1", "h2"]), None);
    let snap = q.snapshot();
    assert_eq!(snap.depth("h1"), 1);
    assert_eq!(snap.depth("h2"), 1);
    assert_eq!(snap.depth("h3"), 0);
    assert_eq!(snap.size, 1);
    assert_eq!(n[0].assigned(), vec!["h1", "h2"]);

    let (got, kind) = q.dequeue("h2", 0).unwrap();
    assert_eq!(got.name(), "shared");
    assert_eq!(kind, DequeueKind::Local);

    let snap = q.snapshot();
    assert_eq!(snap.depth("h1"), 0);
    assert_eq!(snap.size, 0);
    assert!(q.dequeue("h1", 3).is_none());
    assert!(q.dequeue("h3", 3).is_none());
}

#[test]
fn unknown_hosts_in_hints_are_ignored_when_one_matches() {
    let (_g, n) = nodes(&["x"]);
    let q = fast_queue(&["h1", "h2"], false);
    q.enqueue(n[0].clone(), hints(&["nowhere", "h2"]), None);
    let snap = q.snapshot();
    assert_eq!(snap.depth("h2"), 1);
    assert_eq!(snap.depth("remote"), 0);
}

#[test]
fn without_steal_other_hosts_work_is_never_taken() {
    let (_g, n) = nodes(&["for_h2"]);
    let q = fast_queue(&["h1", "h2"], false);
    q.enqueue(n[0].clone(), hints(&["h2"]), None);

    for retry in 0..5 {
        assert!(q.dequeue("h1", retry).is_none());
    }
    assert_eq!(q.len(), 1);
    assert_eq!(name_of(q.dequeue("h2", 0)), Some(("for_h2".into(), DequeueKind::Local)));
}

#[test]
fn steal_takes_from_deepest_tier_first_host_on_ties() {
    let (_g, n) = nodes(&["a", "b", "c", "d"]);
    let q = fast_queue(&["h1", "h2", "h3"], true);
    q.enqueue(n[0].clone(), hints(&["h2"]), None);
    q.enqueue(n[1].clone(), hints(&["h3"]), None);
    q.enqueue(n[2].clone(), hints(&["h3"]), None);

    assert_eq!(
        name_of(q.dequeue("h1", 1)),
        Some(("b".into(), DequeueKind::Steal { from: "h3".into() }))
    );
    // h2 and h3 now tie at depth 1; h2 comes first.
    assert_eq!(
        name_of(q.dequeue("h1", 1)),
        Some(("a".into(), DequeueKind::Steal { from: "h2".into() }))
    );
    q.enqueue(n[3].clone(), hints(&["h3"]), None);
    assert_eq!(
        name_of(q.dequeue("h1", 2)),
        Some(("c".into(), DequeueKind::Steal { from: "h3".into() }))
    );
}

#[test]
fn backoff_doubles_and_caps() {
    let opts = QueueOptions::default();
    assert_eq!(opts.backoff(0), Duration::from_millis(50));
    assert_eq!(opts.backoff(3), Duration::from_millis(400));
    assert_eq!(opts.backoff(10), Duration::from_millis(51_200));
    assert_eq!(opts.backoff(11), Duration::from_millis(51_200));
    assert_eq!(opts.backoff(u32::MAX), Duration::from_millis(51_200));
}

#[test]
fn empty_dequeue_waits_for_the_backoff_interval() {
    let q = fast_queue(&["h1"], true);
    // base 1ms, cap level 2 => at most 4ms.
    let start = Instant::now();
    assert!(q.dequeue("h1", 7).is_none());
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(4));
    assert!(waited < Duration::from_secs(1));
}

#[test]
fn parked_worker_is_woken_by_matching_enqueue() {
    let (_g, n) = nodes(&["job"]);
    let q = Arc::new(LocalityAwareQueue::new(
        &hints(&["h1", "h2"]),
        AffinityTable::default(),
        QueueOptions {
            enable_steal: false,
            base_wait: Duration::from_secs(2),
            max_backoff_level: 0,
        },
        Arc::new(RecordingSink::new()),
    ));

    let worker = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            let start = Instant::now();
            assert!(q.dequeue("h1", 0).is_none());
            let woke_after = start.elapsed();
            (woke_after, q.dequeue("h1", 0).map(|(n, _)| n.name().to_string()))
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while q.waiting() < 1 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }
    q.enqueue(n[0].clone(), hints(&["h1"]), None);

    let (woke_after, got) = worker.join().unwrap();
    assert!(woke_after < Duration::from_secs(1), "woke after {woke_after:?}");
    assert_eq!(got.as_deref(), Some("job"));
}

#[test]
fn batch_release_falls_back_to_any_parked_worker() {
    let (_g, n) = nodes(&["a", "b"]);
    let sink = Arc::new(RecordingSink::new());
    let q = Arc::new(LocalityAwareQueue::new(
        &hints(&["h1", "h2"]),
        AffinityTable::default(),
        QueueOptions {
            enable_steal: true,
            base_wait: Duration::from_secs(2),
            max_backoff_level: 0,
        },
        sink.clone(),
    ));

    let worker = {
        let q = Arc::clone(&q);
        thread::spawn(move || {
            let start = Instant::now();
            assert!(q.dequeue("h2", 1).is_none());
            let woke_after = start.elapsed();
            (woke_after, name_of(q.dequeue("h2", 1)))
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while q.waiting() < 1 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }
    q.enqueue_all(
        vec![(n[0].clone(), hints(&["h1"])), (n[1].clone(), hints(&["h1"]))],
        Some("h1"),
    );

    let (woke_after, got) = worker.join().unwrap();
    assert!(woke_after < Duration::from_secs(1), "woke after {woke_after:?}");
    assert_eq!(got, Some(("a".into(), DequeueKind::Steal { from: "h1".into() })));

    let wakes = sink.filter(|e| match e {
        SchedEvent::Woken { hints, woken } => Some((hints.clone(), *woken)),
        _ => None,
    });
    assert_eq!(wakes[0], (hints(&["h1"]), 0));
    assert_eq!(wakes.iter().map(|(_, w)| w).sum::<usize>(), 1);
}

#[test]
fn hold_stages_enqueues_until_released() {
    let (_g, n) = nodes(&["a", "b"]);
    let q = fast_queue(&["h1"], false);

    let hold = q.hold();
    q.enqueue(n[0].clone(), Vec::new(), None);
    q.enqueue(n[1].clone(), hints(&["h1"]), None);
    assert_eq!(q.len(), 0);
    assert_eq!(q.snapshot().staged, 2);
    assert!(!q.is_drained());
    assert!(q.dequeue("h1", 0).is_none());

    drop(hold);
    assert_eq!(q.len(), 2);
    assert_eq!(q.snapshot().staged, 0);
}

#[test]
fn nested_holds_release_on_last_drop() {
    let (_g, n) = nodes(&["a"]);
    let q = fast_queue(&["h1"], false);
    let outer = q.hold();
    let inner = q.hold();
    q.enqueue(n[0].clone(), Vec::new(), None);
    drop(inner);
    assert_eq!(q.len(), 0);
    drop(outer);
    assert_eq!(q.len(), 1);
}

#[test]
fn drained_only_after_task_done() {
    let (_g, n) = nodes(&["a"]);
    let q = fast_queue(&["h1"], false);
    assert!(q.is_drained());

    q.enqueue(n[0].clone(), Vec::new(), None);
    assert!(!q.is_drained());
    let _ = q.dequeue("h1", 0).unwrap();
    assert!(!q.is_drained());
    q.task_done();
    assert!(q.is_drained());
}

#[test]
fn closed_queue_serves_nothing() {
    let (_g, n) = nodes(&["a", "b"]);
    let q = fast_queue(&["h1"], false);
    q.enqueue(n[0].clone(), Vec::new(), None);
    q.close();
    assert!(q.is_closed());
    assert!(q.dequeue("h1", 0).is_none());
    q.enqueue(n[1].clone(), Vec::new(), None);
    assert_eq!(q.len(), 1);
}

#[test]
fn close_discards_staged_work() {
    let (_g, n) = nodes(&["a"]);
    let q = fast_queue(&["h1"], false);
    let hold = q.hold();
    q.enqueue(n[0].clone(), Vec::new(), None);
    q.close();
    drop(hold);
    assert_eq!(q.len(), 0);
}

#[test]
fn events_describe_placement_and_steals() {
    let (_g, n) = nodes(&["a", "b"]);
    let sink = Arc::new(RecordingSink::new());
    let q = LocalityAwareQueue::new(
        &hints(&["h1", "h2"]),
        AffinityTable::default(),
        QueueOptions {
            enable_steal: true,
            base_wait: Duration::from_millis(1),
            max_backoff_level: 1,
        },
        sink.clone(),
    );
    q.enqueue(n[0].clone(), hints(&["h2"]), None);
    q.enqueue(n[1].clone(), hints(&["far.away"]), None);
    q.dequeue("h1", 0).unwrap();
    q.dequeue("h1", 1).unwrap();

    let placements = sink.filter(|e| match e {
        SchedEvent::Enqueued { task, placement } => Some((task.clone(), placement.clone())),
        _ => None,
    });
    assert_eq!(
        placements,
        vec![
            ("a".to_string(), Placement::Hosts(hints(&["h2"]))),
            ("b".to_string(), Placement::Remote),
        ]
    );
    let kinds = sink.filter(|e| match e {
        SchedEvent::Dequeued { kind, .. } => Some(kind.clone()),
        _ => None,
    });
    assert_eq!(
        kinds,
        vec![DequeueKind::Remote, DequeueKind::Steal { from: "h2".into() }]
    );

    q.close();
    let wakes = sink.filter(|e| match e {
        SchedEvent::Woken { hints, woken } => Some((hints.clone(), *woken)),
        _ => None,
    });
    assert_eq!(
        wakes,
        vec![(hints(&["h2"]), 0), (Vec::new(), 0), (Vec::new(), 0)]
    );
}

#[test]
fn snapshot_display_lists_every_tier() {
    let (_g, n) = nodes(&["a", "b"]);
    let q = fast_queue(&["h1"], false);
    q.enqueue(n[0].clone(), hints(&["h1"]), None);
    q.enqueue(n[1].clone(), hints(&["h1"]), None);
    let text = q.snapshot().to_string();
    assert!(text.contains("nohint: size=0 []"));
    assert!(text.contains("h1: size=2 [a,..]"));
    assert!(text.contains("remote: size=0 []"));
}
