// src/exec/mod.rs

//! Task execution collaborators.
//!
//! - [`backend`] defines the `Executor` trait workers call.
//! - [`shell`] runs commands locally (`ShellExecutor`) or only logs them
//!   (`DryRunExecutor`).
//! - [`location`] provides `LocationOracle` implementations that tell the
//!   scheduler where finished artifacts live.

pub mod backend;
pub mod location;
pub mod shell;

pub use backend::{ExecOutcome, Executor, Job};
pub use location::{DeclaredLocations, ExecHostLocations, LocationOracle, NoLocations};
pub use shell::{DryRunExecutor, ShellExecutor};
