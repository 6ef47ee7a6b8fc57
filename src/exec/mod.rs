// src/exec/mod.rs

//! Reconciliation sinks.
//!
//! The engine hands every released command to a [`ReconciliationSink`]; what
//! "reload this unit" means is entirely up to the sink.
//!
//! - [`backend`] defines the trait, the command type and [`LogSink`].
//! - [`command`] provides [`CommandSink`], which runs a shell command per
//!   reconciliation.

pub mod backend;
pub mod command;

pub use backend::{LogSink, ReconcileCommand, ReconciliationSink, SinkFuture};
pub use command::CommandSink;
