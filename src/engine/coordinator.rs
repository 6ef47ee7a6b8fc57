// src/engine/coordinator.rs

//! Dedup-and-ingest policy in front of the scheduler.
//!
//! Live redefinitions mark their unit loaded, go through the analyzer and
//! are scheduled under every registered scope of their context that
//! contains the unit. File events are dropped for units the context already
//! loaded (the live channel owns those) and are otherwise scheduled without
//! analysis, since there are no old bytes to compare against.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::analyze::{verdict, ChangeAnalyzer};
use crate::engine::slot::IngestOutcome;
use crate::engine::Scheduler;
use crate::event::{BaseScope, ChangeEvent, ContextId, Payload, UnitId};
use crate::registry::LoadedUnitRegistry;
use crate::types::{ChannelKind, ReconcilePolicy};

/// What happened to one incoming observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Folded into the merge queue, one outcome per matching scope.
    Scheduled(Vec<IngestOutcome>),
    /// File event for a unit the live channel already covers.
    AlreadyLoaded,
    /// The analyzer found nothing worth reconciling (strict policy only).
    Unchanged,
    /// The unit is not under any scope registered for its context.
    OutOfScope,
    /// The raw event could not be turned into a unit or is not a tracked
    /// artifact change.
    Skipped,
}

impl Disposition {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Disposition::Scheduled(_))
    }
}

#[derive(Debug)]
pub struct Coordinator {
    registry: LoadedUnitRegistry,
    analyzer: Arc<dyn ChangeAnalyzer>,
    policy: ReconcilePolicy,
    scopes: DashMap<ContextId, Vec<BaseScope>>,
    scheduler: Scheduler,
}

impl Coordinator {
    pub fn new(
        scheduler: Scheduler,
        analyzer: Arc<dyn ChangeAnalyzer>,
        policy: ReconcilePolicy,
    ) -> Self {
        Self {
            registry: LoadedUnitRegistry::new(),
            analyzer,
            policy,
            scopes: DashMap::new(),
            scheduler,
        }
    }

    pub fn registry(&self) -> &LoadedUnitRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    /// Track units of `context` under `scope`.
    pub fn register_scope(&self, context: ContextId, scope: BaseScope) {
        let mut scopes = self.scopes.entry(context.clone()).or_default();
        if !scopes.contains(&scope) {
            debug!(%context, %scope, "registered base scope");
            scopes.push(scope);
        }
    }

    /// A unit was redefined in a running context.
    ///
    /// `old` may be absent; the last representation seen for the unit is
    /// used instead, if there is one.
    ///
    /// Routing, registry updates and scheduling happen under the read guard
    /// of the context's scope entry, which `teardown_context` must acquire
    /// exclusively first. The analyzer runs outside that guard, so the
    /// context may be torn down meanwhile; the event is then dropped as
    /// [`Disposition::OutOfScope`].
    pub fn ingest_live(
        &self,
        context: &ContextId,
        unit: &UnitId,
        old: Option<Arc<[u8]>>,
        new: Arc<[u8]>,
    ) -> Disposition {
        let previous = {
            let Some(scopes) = self.scopes.get(context) else {
                trace!(%context, %unit, "redefinition for unregistered context");
                return Disposition::OutOfScope;
            };
            if !scopes.iter().any(|s| s.contains(unit)) {
                trace!(%context, %unit, "redefinition outside registered scopes");
                return Disposition::OutOfScope;
            }
            self.registry
                .swap_representation(context, unit, Arc::clone(&new))
        };
        let old = old.or(previous);

        let significant = verdict(self.analyzer.as_ref(), old.as_deref(), Some(&new[..]));
        if !significant {
            match self.policy {
                ReconcilePolicy::Strict => {
                    debug!(
                        %context,
                        %unit,
                        analyzer = self.analyzer.name(),
                        "no significant change; not reconciling"
                    );
                    return Disposition::Unchanged;
                }
                ReconcilePolicy::Always => {
                    debug!(
                        %context,
                        %unit,
                        analyzer = self.analyzer.name(),
                        "no significant change; reconciling under 'always' policy"
                    );
                }
            }
        }

        let Some(scopes) = self.scopes.get(context) else {
            debug!(%context, %unit, "context torn down during analysis; dropping redefinition");
            return Disposition::OutOfScope;
        };
        let observed_at = Instant::now();
        let outcomes: Vec<_> = scopes
            .iter()
            .filter(|scope| scope.contains(unit))
            .map(|scope| {
                self.scheduler.ingest(ChangeEvent {
                    source: ChannelKind::LiveRedefinition,
                    context: context.clone(),
                    scope: scope.clone(),
                    unit: unit.clone(),
                    payload: Payload::Bytes(Arc::clone(&new)),
                    observed_at,
                })
            })
            .collect();
        if outcomes.is_empty() {
            return Disposition::OutOfScope;
        }
        Disposition::Scheduled(outcomes)
    }

    /// A tracked artifact for `unit` was created or modified on disk.
    pub fn ingest_file(
        &self,
        context: &ContextId,
        scope: &BaseScope,
        unit: &UnitId,
        payload: Payload,
    ) -> Disposition {
        // Held until the command is queued; see `ingest_live`.
        let Some(scopes) = self.scopes.get(context) else {
            trace!(%context, %scope, %unit, "file event for unregistered context");
            return Disposition::OutOfScope;
        };
        if !scopes.contains(scope) || !scope.contains(unit) {
            trace!(%context, %scope, %unit, "file event outside registered scopes");
            return Disposition::OutOfScope;
        }
        if self.registry.is_loaded(context, unit) {
            trace!(%context, %unit, "unit already loaded; file event left to live channel");
            return Disposition::AlreadyLoaded;
        }

        let outcome = self.scheduler.ingest(ChangeEvent {
            source: ChannelKind::FileWatch,
            context: context.clone(),
            scope: scope.clone(),
            unit: unit.clone(),
            payload,
            observed_at: Instant::now(),
        });
        Disposition::Scheduled(vec![outcome])
    }

    /// Discard all pending work, scopes and registry entries of `context`.
    pub fn teardown_context(&self, context: &ContextId) -> usize {
        // Waits for ingests holding the scope guard; nothing is routed into
        // the context after this.
        self.scopes.remove(context);
        let cancelled = self.scheduler.teardown_context(context);
        self.registry.forget_context(context);
        cancelled
    }

    /// Contexts with at least one registered scope.
    pub fn contexts(&self) -> Vec<ContextId> {
        self.scopes.iter().map(|e| e.key().clone()).collect()
    }
}
