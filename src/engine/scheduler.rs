// src/engine/scheduler.rs

//! Timers and execution for pending commands.
//!
//! Every key has a [`KeySlot`] inside a `DashMap`; the map's entry guard is
//! the key-scoped exclusive section. Ingest, timer polls and completions for
//! one key take that guard briefly and never hold it across an `.await`, so
//! the reconciliation call itself runs outside of it and other keys are never
//! blocked.
//!
//! Each created command gets one driver task. The driver sleeps until the
//! command's fire time, re-sleeps if a merge pushed the time back, and runs
//! the command once it is due. A merge that moves the fire time earlier
//! starts a second driver; the one that wakes later finds its command gone.
//! If the previous execution for the key is still running, the driver parks;
//! the finishing execution picks the parked command up and keeps driving it
//! on the same task.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::engine::slot::{FireDecision, IngestOutcome, KeySlot, PendingCommand};
use crate::engine::{DebounceWindows, ExecutionOutcome, ExecutionReport};
use crate::errors::{ReloadqError, Result};
use crate::event::{ChangeEvent, ContextId, ReconciliationKey};
use crate::exec::{ReconcileCommand, ReconciliationSink};

struct Inner {
    slots: DashMap<ReconciliationKey, KeySlot>,
    sink: Arc<dyn ReconciliationSink>,
    windows: DebounceWindows,
    reports: Option<mpsc::UnboundedSender<ExecutionReport>>,
    handle: Handle,
}

/// Debounces commands per key and hands them to a [`ReconciliationSink`].
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("slots", &self.inner.slots.len())
            .field("windows", &self.inner.windows)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler whose timers run on the current Tokio runtime.
    ///
    /// `ingest` may later be called from any thread, including threads that
    /// are not part of the runtime. If `reports` is set, an
    /// [`ExecutionReport`] is sent there for every finished execution.
    pub fn new(
        sink: Arc<dyn ReconciliationSink>,
        windows: DebounceWindows,
        reports: Option<mpsc::UnboundedSender<ExecutionReport>>,
    ) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| ReloadqError::Other(anyhow::anyhow!("scheduler needs a Tokio runtime: {e}")))?;
        Ok(Self::with_handle(handle, sink, windows, reports))
    }

    pub fn with_handle(
        handle: Handle,
        sink: Arc<dyn ReconciliationSink>,
        windows: DebounceWindows,
        reports: Option<mpsc::UnboundedSender<ExecutionReport>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                sink,
                windows,
                reports,
                handle,
            }),
        }
    }

    pub fn windows(&self) -> DebounceWindows {
        self.inner.windows
    }

    /// Fold `event` into the pending command for its key.
    pub fn ingest(&self, event: ChangeEvent) -> IngestOutcome {
        let key = event.key();
        let window = self.inner.windows.for_channel(event.source);
        let source = event.source;

        let outcome = {
            let mut slot = self.inner.slots.entry(key.clone()).or_default();
            slot.ingest(event, Instant::now(), window)
        };

        match outcome {
            IngestOutcome::Merged { generation, merged, rearm, .. } => {
                debug!(%key, generation, merged, rearm, %source, "merged into pending command");
            }
            IngestOutcome::Successor { generation, .. } => {
                debug!(%key, generation, %source, "execution in flight; scheduled successor");
            }
            IngestOutcome::Created { generation, .. } => {
                debug!(%key, generation, %source, ?window, "scheduled new command");
            }
        }

        if let Some((generation, fire_at)) = outcome.needs_driver() {
            let inner = Arc::clone(&self.inner);
            self.inner
                .handle
                .spawn(drive(inner, key, generation, fire_at));
        }

        outcome
    }

    /// Cancel every pending command of `context`.
    ///
    /// Executions already running are left to finish; their completion is
    /// discarded. Returns the number of pending commands cancelled.
    pub fn teardown_context(&self, context: &ContextId) -> usize {
        let mut cancelled = 0;
        self.inner.slots.retain(|key, slot| {
            if &key.context != context {
                return true;
            }
            if slot.pending().is_some() {
                cancelled += 1;
            }
            slot.cancel_for_teardown()
        });
        info!(%context, cancelled, "context torn down");
        cancelled
    }

    pub fn is_pending(&self, key: &ReconciliationKey) -> bool {
        self.inner
            .slots
            .get(key)
            .is_some_and(|slot| slot.pending().is_some())
    }

    pub fn is_in_flight(&self, key: &ReconciliationKey) -> bool {
        self.inner
            .slots
            .get(key)
            .is_some_and(|slot| slot.in_flight().is_some())
    }

    /// Number of keys with a pending command.
    pub fn pending_count(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|slot| slot.pending().is_some())
            .count()
    }
}

/// Timer driver for one command (and any successor it resumes).
async fn drive(inner: Arc<Inner>, key: ReconciliationKey, mut generation: u64, mut fire_at: Instant) {
    loop {
        time::sleep_until(fire_at).await;

        let decision = match inner.slots.get_mut(&key) {
            Some(mut slot) => slot.poll(generation, Instant::now()),
            None => FireDecision::Stale,
        };

        let command = match decision {
            FireDecision::Wait(next) => {
                fire_at = next;
                continue;
            }
            FireDecision::Blocked => {
                debug!(%key, generation, "due while previous execution runs; parked");
                return;
            }
            FireDecision::Stale => return,
            FireDecision::Release(command) => command,
        };

        match execute(&inner, command).await {
            Some((next_generation, next_fire_at)) => {
                generation = next_generation;
                fire_at = next_fire_at;
            }
            None => return,
        }
    }
}

/// Run one released command through the sink and retire it.
///
/// Returns the parked successor to drive next, if any.
async fn execute(inner: &Arc<Inner>, command: PendingCommand) -> Option<(u64, Instant)> {
    let key = command.key.clone();
    let generation = command.generation;
    let merged = command.merged;
    let waited = command.created_at.elapsed();

    info!(%key, generation, merged, ?waited, "reconciling");

    let sink = Arc::clone(&inner.sink);
    let request = ReconcileCommand::from(command);
    // A separate task so a panicking sink fails this execution instead of
    // wedging the key in the in-flight state.
    let result = match tokio::spawn(async move { sink.reconcile(request).await }).await {
        Ok(result) => result,
        Err(join_err) => Err(ReloadqError::Sink(format!("sink task failed: {join_err}"))),
    };

    let completion = match inner.slots.get_mut(&key) {
        Some(mut slot) => Some(slot.complete(generation)),
        None => None,
    };
    inner.slots.remove_if(&key, |_, slot| slot.is_idle());

    let Some(completion) = completion else {
        debug!(%key, generation, "slot vanished during execution; completion ignored");
        return None;
    };

    if completion.detached {
        debug!(%key, generation, "context torn down during execution; completion ignored");
    } else {
        let outcome = match result {
            Ok(()) => {
                info!(%key, generation, "reconciled");
                ExecutionOutcome::Succeeded
            }
            Err(err) => {
                warn!(%key, generation, error = %err, "reconciliation failed");
                ExecutionOutcome::Failed(err.to_string())
            }
        };
        if let Some(tx) = &inner.reports {
            let _ = tx.send(ExecutionReport {
                key: key.clone(),
                generation,
                merged,
                outcome,
                finished_at: Instant::now(),
            });
        }
    }

    completion.resume
}
