// src/cli.rs

//! Command-line interface.
//!
//! The config file describes what to watch. The flags here only pick the
//! file, adjust logging and override the reconcile settings for one run.

use clap::{Parser, ValueEnum};

use crate::config::ConfigFile;
use crate::types::{AnalyzerKind, ReconcilePolicy};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "reloadq",
    version,
    about = "Collapse class-file change bursts into single reload commands.",
    long_about = None
)]
pub struct CliArgs {
    /// Config file describing scopes, roots and debounce windows.
    #[arg(long, value_name = "PATH", default_value = "Reloadq.toml")]
    pub config: String,

    /// Overrides `RELOADQ_LOG` when given.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Override `[reconcile] policy` (always, strict).
    #[arg(long, value_name = "POLICY", value_parser = clap::value_parser!(ReconcilePolicy))]
    pub policy: Option<ReconcilePolicy>,

    /// Override `[reconcile] analyzer` (always, bytes, class-shape).
    #[arg(long, value_name = "ANALYZER", value_parser = clap::value_parser!(AnalyzerKind))]
    pub analyzer: Option<AnalyzerKind>,

    /// Print the resolved scopes and watch roots, then exit.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Apply the reconcile overrides given on the command line to `cfg`.
    pub fn apply_overrides(&self, cfg: &mut ConfigFile) {
        if let Some(policy) = self.policy {
            cfg.reconcile.policy = policy;
        }
        if let Some(analyzer) = self.analyzer {
            cfg.reconcile.analyzer = analyzer;
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
