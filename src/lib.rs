// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod events;
pub mod exec;
pub mod logging;
pub mod profile;
pub mod queue;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::model::{ConfigFile, ConfigSection};
use crate::config::{Cluster, default_config_path, load_and_validate};
use crate::dag::TaskGraph;
use crate::engine::Scheduler;
use crate::errors::HostdagError;
use crate::exec::{DryRunExecutor, ExecHostLocations};
use crate::profile::Profiler;
use crate::types::TaskName;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading, with command-line overrides
/// - cluster layout, task graph and scheduler
/// - executor (shell, or dry run)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    resolve_relative_paths(&mut cfg.config, &config_root_dir(&config_path));
    apply_cli_overrides(&mut cfg.config, &args);

    if args.show_conf {
        print_effective_config(&cfg.config)?;
        return Ok(());
    }

    let cluster = Cluster::from_options(cfg.config.hostfile.as_deref(), cfg.config.num_threads)?;
    let graph = Arc::new(TaskGraph::from_config(&cfg));
    let targets = resolve_targets(&args, &cfg, &graph)?;
    let task_args = args.task_args();

    let mut builder = Scheduler::builder(Arc::clone(&graph), cluster)
        .config(&cfg)?
        .oracle(Arc::new(ExecHostLocations::new()));
    if args.dry_run {
        builder = builder.executor(Arc::new(DryRunExecutor));
    }
    if let Some(path) = &cfg.config.profile {
        let profiler = Profiler::create(path)
            .with_context(|| format!("creating profile {}", path.display()))?;
        builder = builder.profiler(profiler);
    }
    let scheduler = Arc::new(builder.build());

    // Ctrl-C → cancel the run; workers finish their current task.
    {
        let cancel = scheduler.cancel_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; cancelling run");
            cancel.cancel();
        });
    }

    let sched = Arc::clone(&scheduler);
    let report = tokio::task::spawn_blocking(move || sched.run(&targets, &task_args))
        .await
        .context("scheduler thread panicked")??;

    info!(
        targets = ?report.targets,
        executed = report.executed,
        elapsed_s = report.elapsed.as_secs_f64(),
        "build complete"
    );
    Ok(())
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "build/Hostdag.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Hostdag.toml" (parent = ""),
///   paths stay relative to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::new(),
    }
}

fn resolve_relative_paths(section: &mut ConfigSection, root: &Path) {
    for path in [&mut section.hostfile, &mut section.profile].into_iter().flatten() {
        if path.is_relative() {
            *path = root.join(&*path);
        }
    }
}

/// Command line (including `HOSTDAG_*` variables read by clap) over file.
pub fn apply_cli_overrides(section: &mut ConfigSection, args: &CliArgs) {
    match (&args.hostfile, args.num_threads) {
        (Some(hostfile), n) => {
            section.hostfile = Some(hostfile.clone());
            section.num_threads = n;
        }
        (None, Some(n)) => {
            section.hostfile = None;
            section.num_threads = Some(n);
        }
        (None, None) => {}
    }
    section.disable_steal |= args.disable_steal;
    section.disable_affinity |= args.disable_affinity;
    section.halt_queue_while_search |= args.halt_queue_while_search;
    section.keep_going |= args.keep_going;
    if let Some(placement) = args.placement {
        section.placement = placement;
    }
    if args.profile.is_some() {
        section.profile = args.profile.clone();
    }
}

/// Targets from the command line, else `[config].default`, else the DAG's
/// sinks.
pub fn resolve_targets(
    args: &CliArgs,
    cfg: &ConfigFile,
    graph: &TaskGraph,
) -> std::result::Result<Vec<TaskName>, HostdagError> {
    let targets = if !args.targets.is_empty() {
        args.targets.clone()
    } else if !cfg.config.default.is_empty() {
        cfg.config.default.clone()
    } else {
        graph.sinks()
    };
    if let Some(unknown) = targets.iter().find(|t| !graph.contains(t)) {
        return Err(HostdagError::TaskNotFound(unknown.clone()));
    }
    Ok(targets)
}

fn print_effective_config(section: &ConfigSection) -> Result<()> {
    #[derive(Serialize)]
    struct Shown<'a> {
        config: &'a ConfigSection,
    }
    let text = toml::to_string(&Shown { config: section })
        .context("serialising effective config")?;
    println!("{text}");
    Ok(())
}
