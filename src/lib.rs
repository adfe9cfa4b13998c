// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::dag::{DagGraph, RootPolicy, TaskSegment};
use crate::engine::{ConcurrentScheduler, SchedulerOptions};
use crate::exec::{CommandAction, OutputMux};

pub use crate::engine::{run as run_segments, RunResult};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - module graph and segments
/// - the shell-command build action
/// - the concurrent scheduler
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let threads = args.threads.unwrap_or_else(|| cfg.threads());
    let behaviour = args.failure_behaviour().unwrap_or(cfg.reactor.fail);
    let output_mode = args.output.unwrap_or(cfg.reactor.output);
    let root_policy = if cfg.reactor.strict_roots {
        RootPolicy::Strict
    } else {
        RootPolicy::FirstUnit
    };

    if args.dry_run {
        print_dry_run(&cfg, &threads.to_string(), behaviour);
        return Ok(());
    }

    let graph = DagGraph::from_config(&cfg);
    let segments = TaskSegment::from_config(&cfg);
    let action = CommandAction::from_config(&cfg, &config_root_dir(&config_path));

    let options = SchedulerOptions::default()
        .with_concurrency(threads.resolve())
        .with_failure_behaviour(behaviour)
        .with_root_policy(root_policy)
        .with_output(OutputMux::stdout(output_mode));

    let scheduler = ConcurrentScheduler::new(action, options);

    // Ctrl-C → stop submitting, drain what is running.
    {
        let handle = scheduler.halt_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; interrupting build");
            handle.interrupt();
        });
    }

    let result = scheduler.run(&segments, &graph).await;
    println!("{}", result.render_summary());

    if !result.is_success_for(behaviour) {
        bail!(
            "build failed: {} module(s) failed, {} not built",
            result.failed_units().len(),
            result.never_attempted.len()
        );
    }
    Ok(())
}

/// Directory module commands run in by default.
///
/// - If the config path has a non-empty parent (e.g. "modules/Reactor.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Reactor.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print settings, modules and segments.
fn print_dry_run(cfg: &ConfigFile, threads: &str, behaviour: crate::types::FailureBehaviour) {
    println!("reactor dry-run");
    println!("  reactor.threads = {threads}");
    println!("  reactor.fail = {behaviour:?}");
    println!("  reactor.output = {:?}", cfg.reactor.output);
    println!("  reactor.strict_roots = {}", cfg.reactor.strict_roots);
    println!();

    println!("modules ({}):", cfg.module.len());
    for (name, module) in cfg.module.iter() {
        println!("  - {name}");
        println!("      cmd: {}", module.cmd);
        if !module.after.is_empty() {
            println!("      after: {:?}", module.after);
        }
        if let Some(ref dir) = module.dir {
            println!("      dir: {dir}");
        }
    }
    println!();

    println!("segments ({}):", cfg.segment.len());
    for segment in cfg.segment.iter() {
        println!("  - {}: {:?}", segment.name, segment.modules);
    }

    debug!("dry-run complete (no execution)");
}
