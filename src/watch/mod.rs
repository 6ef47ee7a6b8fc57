// src/watch/mod.rs

//! File watching and path translation.
//!
//! This module is responsible for:
//! - Compiling per-scope artifact patterns and resolving scope roots.
//! - Translating a changed path into the unit it defines.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does not decide whether a change gets reconciled; that is the
//! coordinator's job.

pub mod patterns;
pub mod translate;
pub mod watcher;

pub use patterns::{build_profiles_from_config, ScopeWatchProfile, DEFAULT_ARTIFACT_PATTERN};
pub use translate::{relative_str, translate};
pub use watcher::{fs_event_kind, spawn_watcher, WatcherHandle};
