// src/channel/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::engine::{Coordinator, Disposition};
use crate::event::{ContextId, Payload};
use crate::fs::FileSystem;
use crate::types::FsEventKind;
use crate::watch::{translate, ScopeWatchProfile};

/// Turns raw filesystem events into file-watch change events.
#[derive(Debug)]
pub struct FileWatchChannel {
    coordinator: Arc<Coordinator>,
    fs: Arc<dyn FileSystem>,
    profiles: Vec<ScopeWatchProfile>,
}

impl FileWatchChannel {
    pub fn new(
        coordinator: Arc<Coordinator>,
        fs: Arc<dyn FileSystem>,
        profiles: Vec<ScopeWatchProfile>,
    ) -> Self {
        Self {
            coordinator,
            fs,
            profiles,
        }
    }

    pub fn profiles(&self) -> &[ScopeWatchProfile] {
        &self.profiles
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// A raw event for `path` observed on behalf of `context`.
    ///
    /// Returns one disposition per scope of `context` whose roots contain
    /// the path; empty if none do.
    pub fn on_file_event(&self, context: &ContextId, path: &Path, kind: FsEventKind) -> Vec<Disposition> {
        self.profiles
            .iter()
            .filter(|p| p.context() == context && p.root_of(path).is_some())
            .map(|profile| self.handle(profile, path, kind))
            .collect()
    }

    /// A raw event for `path`, routed to every context watching it.
    pub fn on_path_event(&self, path: &Path, kind: FsEventKind) -> Vec<Disposition> {
        self.profiles
            .iter()
            .filter(|p| p.root_of(path).is_some())
            .map(|profile| self.handle(profile, path, kind))
            .collect()
    }

    fn handle(&self, profile: &ScopeWatchProfile, path: &Path, kind: FsEventKind) -> Disposition {
        if !kind.is_relevant() {
            trace!(?path, ?kind, "ignoring file event kind");
            return Disposition::Skipped;
        }

        // Usually a file still being written or already gone again; a later
        // event for the same path will carry the final content.
        let unit = match translate(self.fs.as_ref(), profile, path) {
            Ok(unit) => unit,
            Err(err) => {
                trace!(error = %err, "skipping file event");
                return Disposition::Skipped;
            }
        };

        self.coordinator.ingest_file(
            profile.context(),
            profile.scope(),
            &unit,
            Payload::File(PathBuf::from(path)),
        )
    }
}
