// src/exec/backend.rs

//! Pluggable reconciliation sink abstraction.
//!
//! The scheduler talks to a `ReconciliationSink` instead of knowing how a
//! framework re-registers a component. Tests provide a recording sink; the
//! binary uses either [`LogSink`] or [`super::CommandSink`].

use std::future::Future;
use std::pin::Pin;

use tracing::info;

use crate::engine::PendingCommand;
use crate::errors::Result;
use crate::event::{BaseScope, ContextId, Payload, UnitId};
use crate::types::ChannelKind;

pub type SinkFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// One "reload this unit" request, owned by the sink once handed over.
#[derive(Debug, Clone)]
pub struct ReconcileCommand {
    pub context: ContextId,
    pub scope: BaseScope,
    pub unit: UnitId,
    pub payload: Payload,
    /// Channel of the last event merged into this command.
    pub source: ChannelKind,
    /// How many raw events were collapsed into this command.
    pub merged: u32,
    pub generation: u64,
    /// blake3 digest of `payload` when it carries bytes.
    pub digest: Option<String>,
}

impl From<PendingCommand> for ReconcileCommand {
    fn from(cmd: PendingCommand) -> Self {
        let digest = cmd.latest_payload.digest();
        Self {
            context: cmd.key.context,
            scope: cmd.key.scope,
            unit: cmd.key.unit,
            payload: cmd.latest_payload,
            source: cmd.source,
            merged: cmd.merged,
            generation: cmd.generation,
            digest,
        }
    }
}

/// Trait abstracting how a released command is reconciled.
///
/// The outcome is only logged and reported; it never changes merge state
/// beyond retiring the command, and failures are not retried.
pub trait ReconciliationSink: Send + Sync {
    fn reconcile(&self, command: ReconcileCommand) -> SinkFuture<'_>;
}

/// Sink that only logs what would be reconciled.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReconciliationSink for LogSink {
    fn reconcile(&self, command: ReconcileCommand) -> SinkFuture<'_> {
        Box::pin(async move {
            info!(
                context = %command.context,
                scope = %command.scope,
                unit = %command.unit,
                source = %command.source,
                merged = command.merged,
                payload = ?command.payload,
                "reload requested"
            );
            Ok(())
        })
    }
}
