// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the DAG search ([`crate::dag`]) and the locality-aware ready queue
//!   ([`crate::queue`]), joined by the [`dispatch::Dispatcher`]
//! - placement hints derived from prerequisite locations
//! - the worker pool and run termination
//!
//! [`scheduler::Scheduler`] is the entry point; everything else is
//! constructed per run.

pub mod control;
pub mod dispatch;
pub mod placement;
pub mod scheduler;
pub mod worker;

pub use control::{CancelHandle, RunControl, RunEnd};
pub use dispatch::Dispatcher;
pub use placement::{DataLocation, FirstPrerequisite, MajorityData, PlacementHints};
pub use scheduler::{RunReport, Scheduler, SchedulerBuilder, SchedulerOptions};
pub use worker::{LocalityStats, WorkerContext};
