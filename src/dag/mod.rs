// src/dag/mod.rs

//! DAG representation and the dependency search protocol.
//!
//! - [`node`] holds per-vertex state (`TaskNode`) and static task specs.
//! - [`graph`] is the registry that materialises nodes lazily by name.
//! - [`search`] walks the DAG from requested targets and resolves
//!   dependents when a node finishes.

pub mod graph;
pub mod node;
pub mod search;

pub use graph::TaskGraph;
pub use node::{NodeStatus, TaskNode, TaskSpec};
pub use search::{DagSearch, ReadyQueue};
