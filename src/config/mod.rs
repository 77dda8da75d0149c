// src/config/mod.rs

//! Configuration loading and validation for hostdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like DAG correctness (`validate.rs`).
//! - Describe the worker host layout (`hosts.rs`).

pub mod hosts;
pub mod loader;
pub mod model;
pub mod validate;

pub use hosts::{Cluster, LOCALHOST};
pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{AffinityEntry, ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
