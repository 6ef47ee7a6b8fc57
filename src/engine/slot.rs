// src/engine/slot.rs

//! Pure per-key merge state.
//!
//! A [`KeySlot`] holds everything the engine knows about one
//! [`ReconciliationKey`]: the pending command (if any) and the execution in
//! flight (if any). It never reads a clock, spawns, or locks; the scheduler
//! passes `now` in and keeps the slot behind its per-key lock. That keeps the
//! merge rules testable without Tokio.

use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::event::{ChangeEvent, Payload, ReconciliationKey};
use crate::types::ChannelKind;

/// A command waiting for its quiet window to elapse.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub key: ReconciliationKey,
    pub latest_payload: Payload,
    /// Channel of the most recent event folded in.
    pub source: ChannelKind,
    pub scheduled_fire_time: Instant,
    pub created_at: Instant,
    /// Identifies this command among all commands ever created for the key.
    pub generation: u64,
    /// Number of events folded into this command.
    pub merged: u32,
}

/// What `ingest` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// No command existed; a new one was created.
    Created { generation: u64, fire_at: Instant },
    /// The event replaced the payload of a not-yet-fired command.
    Merged {
        generation: u64,
        fire_at: Instant,
        merged: u32,
        /// The fire time moved earlier than the running driver's deadline
        /// (a shorter window took over), so another driver is needed.
        rearm: bool,
    },
    /// An execution is in flight; a fresh successor command was created.
    Successor { generation: u64, fire_at: Instant },
}

impl IngestOutcome {
    /// Generation and fire time of a command that needs a timer driver.
    ///
    /// Merges reuse the driver already sleeping for that command unless the
    /// fire time moved earlier. A superseded driver later finds its command
    /// gone and stops.
    pub fn needs_driver(&self) -> Option<(u64, Instant)> {
        match *self {
            IngestOutcome::Created { generation, fire_at }
            | IngestOutcome::Successor { generation, fire_at }
            | IngestOutcome::Merged {
                generation,
                fire_at,
                rearm: true,
                ..
            } => Some((generation, fire_at)),
            IngestOutcome::Merged { rearm: false, .. } => None,
        }
    }

    pub fn generation(&self) -> u64 {
        match *self {
            IngestOutcome::Created { generation, .. }
            | IngestOutcome::Merged { generation, .. }
            | IngestOutcome::Successor { generation, .. } => generation,
        }
    }
}

/// Result of a timer driver checking its command.
#[derive(Debug)]
pub enum FireDecision {
    /// Quiet window elapsed; the command now belongs to the caller.
    Release(PendingCommand),
    /// The window was reset by a merge; sleep until this instant.
    Wait(Instant),
    /// Due, but the previous execution is still running. The command stays
    /// pending and is resumed by `complete`.
    Blocked,
    /// The command the driver was started for no longer exists.
    Stale,
}

/// Result of finishing an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// The context was torn down while the execution ran.
    pub detached: bool,
    /// A successor that was blocked behind the execution and now needs a
    /// driver again.
    pub resume: Option<(u64, Instant)>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    detached: bool,
}

#[derive(Debug, Default)]
pub struct KeySlot {
    pending: Option<PendingCommand>,
    in_flight: Option<InFlight>,
    /// The pending command's driver gave up because of `in_flight`.
    parked: bool,
    next_generation: u64,
}

impl KeySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingCommand> {
        self.pending.as_ref()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.map(|f| f.generation)
    }

    /// Nothing pending and nothing running: the slot can be dropped.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight.is_none()
    }

    /// Fold `event` into this slot.
    pub fn ingest(&mut self, event: ChangeEvent, now: Instant, window: Duration) -> IngestOutcome {
        let fire_at = now + window;

        if let Some(pending) = self.pending.as_mut() {
            let rearm = fire_at < pending.scheduled_fire_time && !self.parked;
            pending.latest_payload = event.payload;
            pending.source = event.source;
            pending.scheduled_fire_time = fire_at;
            pending.merged += 1;
            return IngestOutcome::Merged {
                generation: pending.generation,
                fire_at,
                merged: pending.merged,
                rearm,
            };
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        let key = event.key();
        debug!(%key, generation, "created pending command");
        self.pending = Some(PendingCommand {
            key,
            latest_payload: event.payload,
            source: event.source,
            scheduled_fire_time: fire_at,
            created_at: now,
            generation,
            merged: 1,
        });
        self.parked = false;

        if self.in_flight.is_some() {
            IngestOutcome::Successor { generation, fire_at }
        } else {
            IngestOutcome::Created { generation, fire_at }
        }
    }

    /// Called by the driver of `generation` once its timer expires.
    pub fn poll(&mut self, generation: u64, now: Instant) -> FireDecision {
        let fire_at = match &self.pending {
            Some(p) if p.generation == generation => p.scheduled_fire_time,
            _ => return FireDecision::Stale,
        };
        if now < fire_at {
            return FireDecision::Wait(fire_at);
        }
        if self.in_flight.is_some() {
            self.parked = true;
            return FireDecision::Blocked;
        }
        match self.pending.take() {
            Some(command) => {
                self.in_flight = Some(InFlight {
                    generation,
                    detached: false,
                });
                FireDecision::Release(command)
            }
            None => FireDecision::Stale,
        }
    }

    /// Called when the execution of `generation` finished (either way).
    pub fn complete(&mut self, generation: u64) -> Completion {
        let detached = match self.in_flight {
            Some(f) if f.generation == generation => {
                self.in_flight = None;
                f.detached
            }
            // Not ours: the slot was recreated after a teardown.
            _ => true,
        };

        let resume = if self.parked && self.in_flight.is_none() {
            self.parked = false;
            self.pending
                .as_ref()
                .map(|p| (p.generation, p.scheduled_fire_time))
        } else {
            None
        };

        Completion { detached, resume }
    }

    /// Cancel pending work because the owning context is going away.
    ///
    /// Returns true if the slot must be kept because an execution is still
    /// running; that execution's completion will be a no-op.
    pub fn cancel_for_teardown(&mut self) -> bool {
        self.pending = None;
        self.parked = false;
        match self.in_flight.as_mut() {
            Some(f) => {
                f.detached = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::event::{BaseScope, ContextId, UnitId};

    const WINDOW: Duration = Duration::from_millis(600);

    fn event(path: &str, at: Instant) -> ChangeEvent {
        ChangeEvent {
            source: ChannelKind::FileWatch,
            context: ContextId::from("app"),
            scope: BaseScope::from("com.example"),
            unit: UnitId::from("com.example.Foo"),
            payload: Payload::File(PathBuf::from(path)),
            observed_at: at,
        }
    }

    #[test]
    fn merge_replaces_payload_and_resets_window() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();

        let first = slot.ingest(event("a", t0), t0, WINDOW);
        assert!(matches!(first, IngestOutcome::Created { generation: 0, .. }));

        let t1 = t0 + Duration::from_millis(100);
        let second = slot.ingest(event("b", t1), t1, WINDOW);
        assert_eq!(
            second,
            IngestOutcome::Merged {
                generation: 0,
                fire_at: t1 + WINDOW,
                merged: 2,
                rearm: false,
            }
        );
        assert_eq!(second.needs_driver(), None);

        // Old fire time is no longer the real one.
        assert!(matches!(slot.poll(0, t0 + WINDOW), FireDecision::Wait(t) if t == t1 + WINDOW));

        match slot.poll(0, t1 + WINDOW) {
            FireDecision::Release(cmd) => {
                assert_eq!(cmd.latest_payload, Payload::File(PathBuf::from("b")));
                assert_eq!(cmd.merged, 2);
                assert_eq!(cmd.created_at, t0);
            }
            other => panic!("expected release, got {other:?}"),
        }
        assert_eq!(slot.in_flight(), Some(0));
    }

    #[test]
    fn shorter_window_rearms_the_driver() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        slot.ingest(event("a", t0), t0, WINDOW);

        let t1 = t0 + Duration::from_millis(50);
        let mut live = event("b", t1);
        live.source = ChannelKind::LiveRedefinition;
        let outcome = slot.ingest(live, t1, Duration::ZERO);
        assert_eq!(outcome.needs_driver(), Some((0, t1)));

        let FireDecision::Release(cmd) = slot.poll(0, t1) else {
            panic!("expected release");
        };
        assert_eq!(cmd.source, ChannelKind::LiveRedefinition);
        // The original driver wakes later and finds nothing to do.
        assert!(matches!(slot.poll(0, t0 + WINDOW), FireDecision::Stale));
    }

    #[test]
    fn event_during_execution_creates_successor() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        slot.ingest(event("a", t0), t0, WINDOW);
        let FireDecision::Release(_) = slot.poll(0, t0 + WINDOW) else {
            panic!("expected release");
        };

        let t1 = t0 + WINDOW + Duration::from_millis(5);
        let outcome = slot.ingest(event("b", t1), t1, WINDOW);
        assert_eq!(
            outcome,
            IngestOutcome::Successor {
                generation: 1,
                fire_at: t1 + WINDOW
            }
        );

        // Successor is due but the first execution still runs.
        assert!(matches!(slot.poll(1, t1 + WINDOW), FireDecision::Blocked));
        assert!(slot.pending().is_some());

        let done = slot.complete(0);
        assert!(!done.detached);
        assert_eq!(done.resume, Some((1, t1 + WINDOW)));

        assert!(matches!(slot.poll(1, t1 + WINDOW), FireDecision::Release(_)));
        assert!(!slot.complete(1).detached);
        assert!(slot.is_idle());
    }

    #[test]
    fn completion_without_parked_successor_does_not_resume() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        slot.ingest(event("a", t0), t0, Duration::ZERO);
        let FireDecision::Release(_) = slot.poll(0, t0) else {
            panic!("expected release");
        };
        // Successor whose driver is still sleeping.
        slot.ingest(event("b", t0), t0, WINDOW);
        assert_eq!(slot.complete(0).resume, None);
    }

    #[test]
    fn stale_generation_is_ignored() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        assert!(matches!(slot.poll(3, t0), FireDecision::Stale));
        slot.ingest(event("a", t0), t0, WINDOW);
        assert!(matches!(slot.poll(7, t0 + WINDOW), FireDecision::Stale));
    }

    #[test]
    fn teardown_detaches_running_execution() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        slot.ingest(event("a", t0), t0, Duration::ZERO);
        let FireDecision::Release(_) = slot.poll(0, t0) else {
            panic!("expected release");
        };
        slot.ingest(event("b", t0), t0, WINDOW);

        assert!(slot.cancel_for_teardown());
        assert!(slot.pending().is_none());
        let done = slot.complete(0);
        assert!(done.detached);
        assert_eq!(done.resume, None);
        assert!(slot.is_idle());
    }

    #[test]
    fn teardown_of_pending_only_slot_can_drop_it() {
        let t0 = Instant::now();
        let mut slot = KeySlot::new();
        slot.ingest(event("a", t0), t0, WINDOW);
        assert!(!slot.cancel_for_teardown());
        assert!(slot.is_idle());
    }
}
