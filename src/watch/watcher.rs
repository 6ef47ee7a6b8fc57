// src/watch/watcher.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::channel::FileWatchChannel;
use crate::errors::Result;
use crate::types::FsEventKind;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl WatcherHandle {
    /// Roots actually being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

/// Map a notify event kind onto the kinds the file channel understands.
///
/// Metadata-only modifications (permissions, timestamps) are dropped, as
/// are access events.
pub fn fs_event_kind(kind: &EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Create),
        EventKind::Remove(_) => Some(FsEventKind::Delete),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(FsEventKind::Delete),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(FsEventKind::Create),
        EventKind::Modify(_) => Some(FsEventKind::Modify),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Watch every directory root of `channel`'s scopes recursively and feed the
/// resulting events into it.
///
/// Roots that are not directories (archives, missing paths) are skipped; the
/// live channel still covers their units once loaded.
pub fn spawn_watcher(channel: Arc<FileWatchChannel>) -> Result<WatcherHandle> {
    let mut roots = BTreeSet::new();
    for profile in channel.profiles() {
        for root in profile.roots() {
            if channel.fs().is_dir(root) {
                roots.insert(root.clone());
            } else {
                debug!(context = %profile.context(), ?root, "root is not a directory; not watching");
            }
        }
    }

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("reloadq: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("reloadq: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    let mut watched = Vec::with_capacity(roots.len());
    for root in roots {
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => {
                info!("file watcher started on {:?}", root);
                watched.push(root);
            }
            Err(err) => warn!(?root, error = %err, "cannot watch root"),
        }
    }

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let Some(kind) = fs_event_kind(&event.kind) else {
                continue;
            };
            for path in &event.paths {
                debug!(?path, ?kind, "file event");
                channel.on_path_event(path, kind);
            }
        }
        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        roots: watched,
    })
}
