// src/engine/mod.rs

//! Debounce, merge and dispatch engine.
//!
//! - [`slot`] holds the pure per-key merge state machine (no clocks, no IO).
//! - [`scheduler`] keeps one slot per key in a concurrent map, runs the
//!   timers and calls the reconciliation sink.
//! - [`coordinator`] applies the cross-channel dedup and semantic filtering
//!   policy in front of the scheduler.

use tokio::time::{Duration, Instant};

use crate::event::ReconciliationKey;
use crate::types::ChannelKind;

/// Quiet period per detection channel.
///
/// A file save typically arrives as several events within tens of
/// milliseconds; a live redefinition is already fully applied when it is
/// reported, so its window is usually much shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindows {
    pub file_watch: Duration,
    pub live_redefinition: Duration,
}

impl DebounceWindows {
    pub const DEFAULT_FILE_WATCH: Duration = Duration::from_millis(600);
    pub const DEFAULT_LIVE_REDEFINITION: Duration = Duration::ZERO;

    pub fn for_channel(&self, channel: ChannelKind) -> Duration {
        match channel {
            ChannelKind::FileWatch => self.file_watch,
            ChannelKind::LiveRedefinition => self.live_redefinition,
        }
    }
}

impl Default for DebounceWindows {
    fn default() -> Self {
        Self {
            file_watch: Self::DEFAULT_FILE_WATCH,
            live_redefinition: Self::DEFAULT_LIVE_REDEFINITION,
        }
    }
}

/// Outcome of one reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed(String),
}

/// Sent after every execution whose context is still alive.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub key: ReconciliationKey,
    pub generation: u64,
    pub merged: u32,
    pub outcome: ExecutionOutcome,
    pub finished_at: Instant,
}

pub mod coordinator;
pub mod scheduler;
pub mod slot;

pub use coordinator::{Coordinator, Disposition};
pub use scheduler::Scheduler;
pub use slot::{FireDecision, IngestOutcome, KeySlot, PendingCommand};
