// src/queue/locality.rs

//! Ready queue partitioned by host affinity.
//!
//! Tiers:
//! - `nohint`: nodes with no placement hints, served first-come to anyone
//! - one tier per known host: nodes whose hints name that host; a node with
//!   several matching hints sits in several tiers until one copy is taken
//! - `remote`: nodes whose hints name no known host
//!
//! Dequeue order for a worker on host `h` with retry counter `n`:
//! `nohint`, then `h`'s tier, then `remote`, then (if stealing is enabled
//! and `n > 0`) the deepest host tier. If nothing is found the worker parks
//! on the hinted condvar for `base_wait * 2^min(n, max_backoff_level)` and
//! gets `None` back so it can re-check for termination and retry.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::dag::TaskNode;
use crate::events::{DequeueKind, EventSink, Placement, SchedEvent};
use crate::queue::affinity::AffinityTable;
use crate::queue::cond::HintedCondvar;
use crate::types::Host;

/// Tunables for [`LocalityAwareQueue`].
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub enable_steal: bool,
    /// Wait at retry level 0.
    pub base_wait: Duration,
    /// Retry level beyond which the wait stops growing.
    pub max_backoff_level: u32,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            enable_steal: true,
            base_wait: Duration::from_millis(50),
            max_backoff_level: 10,
        }
    }
}

impl QueueOptions {
    /// Wait applied to an empty dequeue at retry level `level`.
    pub fn backoff(&self, level: u32) -> Duration {
        let exp = level.min(self.max_backoff_level).min(31);
        self.base_wait.saturating_mul(1u32 << exp)
    }
}

#[derive(Default)]
struct QueueState {
    nohint: VecDeque<Arc<TaskNode>>,
    /// Indexed like `LocalityAwareQueue::hosts`.
    per_host: Vec<VecDeque<Arc<TaskNode>>>,
    remote: VecDeque<Arc<TaskNode>>,
    /// Distinct queued nodes (a multi-host node counts once).
    size: usize,
    /// Dequeued but not yet reported done.
    in_flight: usize,
    /// Nesting depth of active holds; while non-zero enqueues are staged.
    hold: usize,
    staged: Vec<(Arc<TaskNode>, Vec<Host>)>,
    closed: bool,
}

pub struct LocalityAwareQueue {
    hosts: Vec<Host>,
    index: HashMap<Host, usize>,
    state: Mutex<QueueState>,
    cv: HintedCondvar<Host>,
    affinity: AffinityTable,
    options: QueueOptions,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for LocalityAwareQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalityAwareQueue")
            .field("hosts", &self.hosts)
            .field("options", &self.options)
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl LocalityAwareQueue {
    /// `hosts` is the fixed set of known hosts; duplicates are ignored and
    /// the first occurrence decides iteration order.
    pub fn new(
        hosts: &[Host],
        affinity: AffinityTable,
        options: QueueOptions,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let mut distinct: Vec<Host> = Vec::new();
        for h in hosts {
            if !distinct.contains(h) {
                distinct.push(h.clone());
            }
        }
        let index = distinct
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        let state = QueueState {
            per_host: vec![VecDeque::new(); distinct.len()],
            ..QueueState::default()
        };

        Self {
            hosts: distinct,
            index,
            state: Mutex::new(state),
            cv: HintedCondvar::new(),
            affinity,
            options,
            sink,
        }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn options(&self) -> &QueueOptions {
        &self.options
    }

    /// Number of distinct queued nodes.
    pub fn len(&self) -> usize {
        self.state.lock().size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nothing queued, nothing staged, and every dequeued node reported done.
    pub fn is_drained(&self) -> bool {
        let st = self.state.lock();
        st.size == 0 && st.in_flight == 0 && st.staged.is_empty()
    }

    /// Number of workers currently parked in `dequeue`.
    pub fn waiting(&self) -> usize {
        self.cv.waiting()
    }

    /// Enqueue a single ready node.
    pub fn enqueue(&self, node: Arc<TaskNode>, hints: Vec<Host>, origin: Option<&str>) {
        self.enqueue_all(vec![(node, hints)], origin);
    }

    /// Enqueue a batch of ready nodes and wake workers for them.
    ///
    /// `origin` is the host whose work released the batch; unbound nodes wake
    /// the waiter whose host scores best against it.
    pub fn enqueue_all(&self, items: Vec<(Arc<TaskNode>, Vec<Host>)>, origin: Option<&str>) {
        if items.is_empty() {
            return;
        }
        let mut st = self.state.lock();
        if st.closed {
            debug!(count = items.len(), "enqueue on closed queue; dropping");
            return;
        }
        if st.hold > 0 {
            debug!(count = items.len(), "queue held; staging enqueue");
            st.staged.extend(items);
            return;
        }

        let placements: Vec<Placement> = items
            .into_iter()
            .map(|(node, hints)| self.place(&mut st, node, &hints))
            .collect();
        self.wake(&placements, origin);
    }

    fn place(&self, st: &mut QueueState, node: Arc<TaskNode>, hints: &[Host]) -> Placement {
        let placement = if hints.is_empty() {
            st.nohint.push_back(Arc::clone(&node));
            Placement::Unassigned
        } else {
            let mut matched: Vec<Host> = Vec::new();
            for h in hints {
                if let Some(&idx) = self.index.get(h) {
                    if !matched.contains(h) {
                        st.per_host[idx].push_back(Arc::clone(&node));
                        matched.push(h.clone());
                    }
                }
            }
            if matched.is_empty() {
                st.remote.push_back(Arc::clone(&node));
                Placement::Remote
            } else {
                node.set_assigned(matched.clone());
                Placement::Hosts(matched)
            }
        };
        st.size += 1;

        self.sink.record(&SchedEvent::Enqueued {
            task: node.name().to_string(),
            placement: placement.clone(),
        });
        placement
    }

    /// Must be called with the state lock held.
    ///
    /// A single host-bound node wakes one waiter, preferring its hosts. A
    /// batch first wakes one waiter per distinct first host; nodes still
    /// without a waiter then fall back to any parked worker, which can
    /// steal them.
    fn wake(&self, placements: &[Placement], origin: Option<&str>) {
        let mut bound: Vec<&[Host]> = Vec::new();
        for placement in placements {
            match placement {
                Placement::Hosts(hosts) => bound.push(hosts),
                Placement::Unassigned | Placement::Remote => {
                    let ranked: Vec<Host> = match origin {
                        Some(o) => self.affinity.rank(Some(o), &self.hosts).into_iter().cloned().collect(),
                        None => Vec::new(),
                    };
                    let woken = usize::from(self.cv.wake_one(&ranked));
                    self.record_wake(ranked, woken);
                }
            }
        }

        match bound.as_slice() {
            [] => {}
            [hosts] => {
                let woken = usize::from(self.cv.wake_one(hosts));
                self.record_wake(hosts.to_vec(), woken);
            }
            _ => {
                let mut firsts: Vec<Host> = Vec::new();
                for host in bound.iter().filter_map(|hosts| hosts.first()) {
                    if !firsts.contains(host) {
                        firsts.push(host.clone());
                    }
                }
                let woken = self.cv.wake_many(&firsts);
                self.record_wake(firsts, woken);
                for hosts in bound.iter().skip(woken) {
                    let hit = self.cv.wake_one(hosts);
                    self.record_wake(hosts.to_vec(), usize::from(hit));
                    if !hit {
                        break;
                    }
                }
            }
        }
    }

    fn record_wake(&self, hints: Vec<Host>, woken: usize) {
        self.sink.record(&SchedEvent::Woken { hints, woken });
    }

    /// Take a ready node for a worker on `host`, or park for the backoff
    /// interval and return `None`. The returned kind names the tier the node
    /// came from.
    ///
    /// `retry` is the number of consecutive empty dequeues this worker has
    /// seen; stealing is only attempted when it is non-zero.
    pub fn dequeue(&self, host: &str, retry: u32) -> Option<(Arc<TaskNode>, DequeueKind)> {
        let mut st = self.state.lock();
        if st.closed {
            return None;
        }

        if let Some((node, kind)) = self.take(&mut st, host, retry) {
            st.in_flight += 1;
            self.sink.record(&SchedEvent::Dequeued {
                task: node.name().to_string(),
                host: host.to_string(),
                kind: kind.clone(),
                retry,
            });
            trace!(queue = %self.snapshot_locked(&st), "after dequeue");
            return Some((node, kind));
        }

        let wait = self.options.backoff(retry);
        trace!(host, retry, wait_s = wait.as_secs_f64(), "queue empty for host; parking");
        self.cv.park(&mut st, host.to_string(), wait);
        None
    }

    fn take(&self, st: &mut QueueState, host: &str, retry: u32) -> Option<(Arc<TaskNode>, DequeueKind)> {
        if let Some(node) = st.nohint.pop_front() {
            st.size -= 1;
            return Some((node, DequeueKind::NoHint));
        }
        if let Some(node) = self.take_from_host(st, host) {
            return Some((node, DequeueKind::Local));
        }
        if let Some(node) = st.remote.pop_front() {
            st.size -= 1;
            return Some((node, DequeueKind::Remote));
        }
        if self.options.enable_steal && retry > 0 {
            if let Some(victim) = self.steal_victim(st) {
                let from = self.hosts[victim].clone();
                debug!(host, from = %from, depth = st.per_host[victim].len(), "stealing from deepest host tier");
                if let Some(node) = self.take_from_host(st, &from) {
                    return Some((node, DequeueKind::Steal { from }));
                }
            }
        }
        None
    }

    /// Pop the head of `host`'s tier and drop its copies from the other tiers
    /// it was placed in.
    fn take_from_host(&self, st: &mut QueueState, host: &str) -> Option<Arc<TaskNode>> {
        let idx = *self.index.get(host)?;
        let node = st.per_host[idx].pop_front()?;
        for other in node.assigned() {
            if other == host {
                continue;
            }
            if let Some(&j) = self.index.get(&other) {
                st.per_host[j].retain(|n| !Arc::ptr_eq(n, &node));
            }
        }
        st.size -= 1;
        Some(node)
    }

    /// Index of the deepest non-empty host tier; the first host wins ties.
    fn steal_victim(&self, st: &QueueState) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (i, tier) in st.per_host.iter().enumerate() {
            let depth = tier.len();
            if depth > best.map_or(0, |(_, d)| d) {
                best = Some((i, depth));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Report that a node returned by `dequeue` has been fully handled,
    /// including enqueueing whatever it released.
    pub fn task_done(&self) {
        let mut st = self.state.lock();
        st.in_flight = st.in_flight.saturating_sub(1);
    }

    /// Stage all enqueues until the returned guard is dropped. Holds nest.
    pub fn hold(&self) -> QueueHold<'_> {
        self.state.lock().hold += 1;
        QueueHold { queue: self }
    }

    fn release(&self) {
        let mut st = self.state.lock();
        st.hold = st.hold.saturating_sub(1);
        if st.hold > 0 || st.staged.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut st.staged);
        debug!(count = staged.len(), "queue hold released; flushing staged nodes");
        if st.closed {
            return;
        }
        let placements: Vec<Placement> = staged
            .into_iter()
            .map(|(node, hints)| self.place(&mut st, node, &hints))
            .collect();
        self.wake(&placements, None);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Stop serving work: every current and future `dequeue` returns `None`.
    pub fn close(&self) {
        let mut st = self.state.lock();
        st.closed = true;
        let woken = self.cv.wake_all();
        self.record_wake(Vec::new(), woken);
        debug!(woken, "queue closed");
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let st = self.state.lock();
        self.snapshot_locked(&st)
    }

    fn snapshot_locked(&self, st: &QueueState) -> QueueSnapshot {
        let head = |q: &VecDeque<Arc<TaskNode>>| q.front().map(|n| n.name().to_string());
        let mut tiers = vec![("nohint".to_string(), st.nohint.len(), head(&st.nohint))];
        for (h, q) in self.hosts.iter().zip(st.per_host.iter()) {
            tiers.push((h.clone(), q.len(), head(q)));
        }
        tiers.push(("remote".to_string(), st.remote.len(), head(&st.remote)));
        QueueSnapshot {
            tiers,
            size: st.size,
            staged: st.staged.len(),
        }
    }
}

/// Guard returned by [`LocalityAwareQueue::hold`].
pub struct QueueHold<'a> {
    queue: &'a LocalityAwareQueue,
}

impl Drop for QueueHold<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}

/// Point-in-time view of the tiers: `(name, depth, head task)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub tiers: Vec<(String, usize, Option<String>)>,
    pub size: usize,
    pub staged: usize,
}

impl QueueSnapshot {
    /// Depth of the named tier (`"nohint"`, `"remote"` or a host name).
    pub fn depth(&self, tier: &str) -> usize {
        self.tiers
            .iter()
            .find(|(name, _, _)| name == tier)
            .map_or(0, |(_, depth, _)| *depth)
    }
}

impl fmt::Display for QueueSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, depth, head) in &self.tiers {
            match (depth, head) {
                (0, _) | (_, None) => writeln!(f, " {name}: size=0 []")?,
                (1, Some(h)) => writeln!(f, " {name}: size=1 [{h}]")?,
                (n, Some(h)) => writeln!(f, " {name}: size={n} [{h},..]")?,
            }
        }
        Ok(())
    }
}
