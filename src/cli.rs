// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Options given here override the `[config]` section of the config file;
//! `--hostfile` and `--num-threads` also read `HOSTDAG_HOSTFILE` and
//! `HOSTDAG_NUM_THREADS`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::{PlacementStrategy, TaskArgs};

/// Command-line arguments for `hostdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hostdag",
    version,
    about = "Build a task DAG on a pool of workers spread across hosts, keeping work close to its data.",
    long_about = None
)]
pub struct CliArgs {
    /// Targets to build. Default: `[config].default`, else every task no
    /// other task depends on.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Path to the config file (TOML).
    ///
    /// Default: `Hostdag.toml` in the current working directory.
    #[arg(short = 'f', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Number of local workers (conflicts with a hostfile).
    #[arg(short = 'j', long, value_name = "N", env = "HOSTDAG_NUM_THREADS")]
    pub num_threads: Option<usize>,

    /// Hostfile with `host [ncore [group]]` lines.
    #[arg(long, value_name = "PATH", env = "HOSTDAG_HOSTFILE")]
    pub hostfile: Option<PathBuf>,

    /// Never take work queued for another host.
    #[arg(long)]
    pub disable_steal: bool,

    /// Queue every task without placement hints.
    #[arg(long)]
    pub disable_affinity: bool,

    /// Hold back all enqueues while a target is being searched.
    #[arg(long)]
    pub halt_queue_while_search: bool,

    /// Keep building unrelated tasks after a failure.
    #[arg(short = 'k', long)]
    pub keep_going: bool,

    /// Placement rule: `majority` or `first_prerequisite`.
    #[arg(long, value_name = "RULE")]
    pub placement: Option<PlacementStrategy>,

    /// Write a CSV execution profile to this path.
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Task argument `key=value` (repeatable, or comma separated).
    #[arg(long = "arg", value_name = "KEY=VALUE")]
    pub args: Vec<TaskArgs>,

    /// Schedule as usual but only log the commands.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    pub show_conf: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HOSTDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// All `--arg` values merged; later values win.
    pub fn task_args(&self) -> TaskArgs {
        self.args
            .iter()
            .flat_map(|a| a.iter())
            .fold(TaskArgs::new(), |acc, (k, v)| acc.with(k, v))
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
