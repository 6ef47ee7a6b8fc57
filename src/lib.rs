// src/lib.rs

pub mod analyze;
pub mod channel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod event;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::analyze::build_analyzer;
use crate::channel::FileWatchChannel;
use crate::cli::CliArgs;
use crate::config::{config_root_dir, load_and_validate, ConfigFile};
use crate::engine::{Coordinator, Scheduler};
use crate::event::{BaseScope, ContextId};
use crate::exec::{CommandSink, LogSink, ReconciliationSink};
use crate::fs::RealFileSystem;
use crate::watch::{build_profiles_from_config, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - scheduler and coordinator
/// - reconciliation sink
/// - file watchers for every scope root
/// - Ctrl-C handling and context teardown
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    args.apply_overrides(&mut cfg);
    let root_dir = config_root_dir(&config_path);

    if args.dry_run {
        print_dry_run(&cfg, &root_dir);
        return Ok(());
    }

    let sink: Arc<dyn ReconciliationSink> = match &cfg.sink.cmd {
        Some(cmd) => Arc::new(CommandSink::new(cmd.clone())),
        None => Arc::new(LogSink),
    };
    let coordinator = Arc::new(build_coordinator(&cfg, sink)?);

    let profiles = build_profiles_from_config(&cfg, &root_dir, &RealFileSystem)?;
    let channel = Arc::new(FileWatchChannel::new(
        Arc::clone(&coordinator),
        Arc::new(RealFileSystem),
        profiles,
    ));
    let watcher = spawn_watcher(channel)?;
    info!(roots = watcher.roots().len(), "watching for class changes");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    for context in coordinator.contexts() {
        coordinator.teardown_context(&context);
    }
    drop(watcher);
    Ok(())
}

/// Build a coordinator for `cfg` and register every configured scope.
///
/// Must be called inside a Tokio runtime.
pub fn build_coordinator(cfg: &ConfigFile, sink: Arc<dyn ReconciliationSink>) -> Result<Coordinator> {
    let scheduler = Scheduler::new(sink, cfg.debounce.windows(), None)?;
    let coordinator = Coordinator::new(
        scheduler,
        build_analyzer(cfg.reconcile.analyzer),
        cfg.reconcile.policy,
    );
    for scope in &cfg.scope {
        coordinator.register_scope(
            ContextId::from(scope.context.as_str()),
            BaseScope::from(scope.base_package.as_str()),
        );
    }
    Ok(coordinator)
}

/// Simple dry-run output: print windows, policy and scopes.
fn print_dry_run(cfg: &ConfigFile, root_dir: &Path) {
    println!("reloadq dry-run");
    println!("  debounce.file_watch_ms = {}", cfg.debounce.file_watch_ms);
    println!(
        "  debounce.live_redefinition_ms = {}",
        cfg.debounce.live_redefinition_ms
    );
    println!("  reconcile.policy = {:?}", cfg.reconcile.policy);
    println!("  reconcile.analyzer = {:?}", cfg.reconcile.analyzer);
    match &cfg.sink.cmd {
        Some(cmd) => println!("  sink.cmd = {cmd}"),
        None => println!("  sink = log only"),
    }
    println!();

    println!("scopes ({}):", cfg.scope.len());
    for scope in &cfg.scope {
        let package = if scope.base_package.is_empty() {
            "<default package>"
        } else {
            scope.base_package.as_str()
        };
        println!("  - {} :: {}", scope.context, package);
        for root in &scope.roots {
            println!("      root: {:?}", root_dir.join(root));
        }
        if let Some(artifacts) = &scope.artifacts {
            println!("      artifacts: {:?}", artifacts);
        }
    }

    debug!("dry-run complete (nothing watched)");
}
