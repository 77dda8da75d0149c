// src/queue/mod.rs

//! Locality-aware ready queue.
//!
//! - [`locality`] is the tiered queue workers dequeue from.
//! - [`cond`] is the hinted condition variable idle workers park on.
//! - [`affinity`] scores host pairs for wake targeting.

pub mod affinity;
pub mod cond;
pub mod locality;

pub use affinity::AffinityTable;
pub use cond::{HintedCondvar, WaitOutcome};
pub use locality::{LocalityAwareQueue, QueueHold, QueueOptions, QueueSnapshot};
