// src/engine/scheduler.rs

//! Run driver: owns the collaborators, spawns the worker pool for one run,
//! performs the top-level searches and waits for a terminal state.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{Cluster, ConfigFile};
use crate::dag::{DagSearch, TaskGraph, TaskNode};
use crate::engine::control::{CancelHandle, RunControl, RunEnd};
use crate::engine::dispatch::Dispatcher;
use crate::engine::placement::{self, PlacementHints};
use crate::engine::worker::{LocalityStats, WorkerContext, WorkerShared, run_worker};
use crate::errors::{HostdagError, Result};
use crate::events::{EventSink, SchedEvent, TracingSink};
use crate::exec::{DeclaredLocations, Executor, LocationOracle, ShellExecutor};
use crate::profile::Profiler;
use crate::queue::{AffinityTable, LocalityAwareQueue, QueueOptions};
use crate::types::{PlacementStrategy, TaskArgs, TaskName};

/// Run-level switches.
#[derive(Debug, Clone, Default)]
pub struct SchedulerOptions {
    /// Keep running unrelated subgraphs after a failure.
    pub keep_going: bool,
    /// Stage enqueues while each top-level search runs.
    pub halt_queue_while_search: bool,
    /// Enqueue everything without hints.
    pub disable_affinity: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub targets: Vec<TaskName>,
    pub executed: usize,
    pub local: usize,
    pub remote: usize,
    pub stolen: usize,
    pub failed: Vec<(TaskName, String)>,
    pub elapsed: Duration,
}

pub struct Scheduler {
    graph: Arc<TaskGraph>,
    cluster: Cluster,
    affinity: AffinityTable,
    queue_options: QueueOptions,
    options: SchedulerOptions,
    placement: Box<dyn PlacementHints>,
    executor: Arc<dyn Executor>,
    oracle: Arc<dyn LocationOracle>,
    sink: Arc<dyn EventSink>,
    profiler: Option<Profiler>,
    cancel: CancelHandle,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("cluster", &self.cluster)
            .field("queue_options", &self.queue_options)
            .field("options", &self.options)
            .field("placement", &self.placement)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    pub fn builder(graph: Arc<TaskGraph>, cluster: Cluster) -> SchedulerBuilder {
        SchedulerBuilder::new(graph, cluster)
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Build and run `targets` (in order) with the given invocation
    /// arguments.
    ///
    /// Cycles reachable from any target are reported before a worker starts.
    /// Targets that already finished in an earlier run are not rebuilt; nodes
    /// left queued or failed by a cancelled or failed run are not retried.
    pub fn run(&self, targets: &[TaskName], args: &TaskArgs) -> Result<RunReport> {
        let started = Instant::now();
        for target in targets {
            if let Some(chain) = self.graph.find_cycle(target)? {
                return Err(HostdagError::DagCycle { chain });
            }
        }

        let queue = LocalityAwareQueue::new(
            &self.cluster.hosts,
            self.affinity.clone(),
            self.queue_options.clone(),
            Arc::clone(&self.sink),
        );
        let dispatcher = Dispatcher::new(
            &self.graph,
            &queue,
            self.placement.as_ref(),
            self.options.disable_affinity,
        );
        let search = DagSearch::new(&self.graph, &dispatcher);
        let control = RunControl::new(self.options.keep_going, self.cancel.clone());
        let stats = LocalityStats::default();
        let shared = WorkerShared {
            queue: &queue,
            search: &search,
            control: &control,
            executor: self.executor.as_ref(),
            oracle: self.oracle.as_ref(),
            sink: self.sink.as_ref(),
            profiler: self.profiler.as_ref(),
            stats: &stats,
        };

        info!(
            targets = ?targets,
            workers = self.cluster.num_workers(),
            hosts = ?self.cluster.hosts,
            "run started"
        );

        let end = thread::scope(|s| -> Result<RunEnd> {
            for (id, host) in self.cluster.core_list.iter().enumerate() {
                let ctx = WorkerContext::new(id, host.clone());
                let shared = &shared;
                let spawned = thread::Builder::new()
                    .name(format!("hostdag-worker-{id}"))
                    .spawn_scoped(s, move || run_worker(ctx, shared));
                if let Err(e) = spawned {
                    queue.close();
                    return Err(e.into());
                }
            }

            let end = self.drive(&search, &queue, &control, targets, args);
            queue.close();
            end
        })?;

        let report = RunReport {
            targets: targets.to_vec(),
            executed: stats.executed.load(Ordering::Relaxed),
            local: stats.local.load(Ordering::Relaxed),
            remote: stats.remote.load(Ordering::Relaxed),
            stolen: stats.stolen.load(Ordering::Relaxed),
            failed: match &end {
                RunEnd::Failed(failures) => failures.clone(),
                _ => Vec::new(),
            },
            elapsed: started.elapsed(),
        };
        info!(
            executed = report.executed,
            local = report.local,
            remote = report.remote,
            stolen = report.stolen,
            elapsed_s = report.elapsed.as_secs_f64(),
            "run finished"
        );

        match end {
            RunEnd::Completed => Ok(report),
            RunEnd::Failed(failures) => match failures.into_iter().next() {
                Some((task, reason)) => Err(HostdagError::TaskFailed { task, reason }),
                None => Ok(report),
            },
            RunEnd::Stalled(unfinished) => Err(HostdagError::Stalled(unfinished)),
            RunEnd::Cancelled => Err(HostdagError::Cancelled),
        }
    }

    /// Search every target, then wait for the run to end. Any search error
    /// closes the queue before staged work is released.
    fn drive(
        &self,
        search: &DagSearch<'_>,
        queue: &LocalityAwareQueue,
        control: &RunControl,
        targets: &[TaskName],
        args: &TaskArgs,
    ) -> Result<RunEnd> {
        let mut target_nodes: Vec<Arc<TaskNode>> = Vec::with_capacity(targets.len());

        for target in targets {
            self.sink.record(&SchedEvent::SearchStarted {
                target: target.clone(),
            });
            let hold = self.options.halt_queue_while_search.then(|| queue.hold());
            match search.invoke(target, args) {
                Ok(already) => {
                    if already {
                        debug!(target = %target, "target already finished");
                    }
                    target_nodes.push(self.graph.node(target)?);
                    drop(hold);
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "search failed; stopping run");
                    queue.close();
                    drop(hold);
                    return Err(e);
                }
            }
            if control.should_stop() {
                break;
            }
        }

        Ok(control.wait(&target_nodes, queue))
    }
}

/// Builder for [`Scheduler`]. Everything except the graph and the cluster
/// has a default: shell execution, declared locations, no explicit affinity
/// scores, tracing sink, majority placement, no profile.
pub struct SchedulerBuilder {
    graph: Arc<TaskGraph>,
    cluster: Cluster,
    affinity: AffinityTable,
    queue_options: QueueOptions,
    options: SchedulerOptions,
    placement: Box<dyn PlacementHints>,
    executor: Option<Arc<dyn Executor>>,
    oracle: Option<Arc<dyn LocationOracle>>,
    sink: Arc<dyn EventSink>,
    profiler: Option<Profiler>,
}

impl SchedulerBuilder {
    pub fn new(graph: Arc<TaskGraph>, cluster: Cluster) -> Self {
        Self {
            graph,
            cluster,
            affinity: AffinityTable::default(),
            queue_options: QueueOptions::default(),
            options: SchedulerOptions::default(),
            placement: placement::for_strategy(PlacementStrategy::default()),
            executor: None,
            oracle: None,
            sink: Arc::new(TracingSink),
            profiler: None,
        }
    }

    /// Apply the run-level settings of a validated config file.
    pub fn config(mut self, cfg: &ConfigFile) -> Result<Self> {
        let c = &cfg.config;
        self.affinity = AffinityTable::from_config(&cfg.affinity)?;
        self.queue_options = QueueOptions {
            enable_steal: !c.disable_steal,
            base_wait: Duration::from_millis(c.base_wait_ms),
            max_backoff_level: c.max_backoff_level,
        };
        self.options = SchedulerOptions {
            keep_going: c.keep_going,
            halt_queue_while_search: c.halt_queue_while_search,
            disable_affinity: c.disable_affinity,
        };
        self.placement = placement::for_strategy(c.placement);
        Ok(self)
    }

    pub fn affinity(mut self, affinity: AffinityTable) -> Self {
        self.affinity = affinity;
        self
    }

    pub fn queue_options(mut self, options: QueueOptions) -> Self {
        self.queue_options = options;
        self
    }

    pub fn options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn placement(mut self, placement: Box<dyn PlacementHints>) -> Self {
        self.placement = placement;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn oracle(mut self, oracle: Arc<dyn LocationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn profiler(mut self, profiler: Profiler) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn build(self) -> Scheduler {
        let oracle = self
            .oracle
            .unwrap_or_else(|| Arc::new(DeclaredLocations::from_graph(&self.graph)));
        Scheduler {
            executor: self.executor.unwrap_or_else(|| Arc::new(ShellExecutor::new())),
            oracle,
            graph: self.graph,
            cluster: self.cluster,
            affinity: self.affinity,
            queue_options: self.queue_options,
            options: self.options,
            placement: self.placement,
            sink: self.sink,
            profiler: self.profiler,
            cancel: CancelHandle::new(),
        }
    }
}
