// File watcher: OS events → throttle → read → broadcast.
// This module handles the first stage: raw FS event detection and filtering.

pub mod pipeline;
pub mod throttle;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use quire_common::path::has_accepted_extension;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Create,
    Modify,
    Remove,
}

/// A filesystem event for a single document, stamped when the OS callback
/// delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub observed_at: Instant,
}

/// What to watch and which paths count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// One file; its parent directory is watched non-recursively.
    File(PathBuf),
    /// A directory tree, filtered to the given extensions.
    Folder { root: PathBuf, extensions: Vec<String> },
}

impl WatchTarget {
    fn canonicalize(self) -> Result<Self> {
        match self {
            Self::File(path) => {
                let canonical = path
                    .canonicalize()
                    .with_context(|| format!("failed to canonicalize watched file: {}", path.display()))?;
                Ok(Self::File(canonical))
            }
            Self::Folder { root, extensions } => {
                let canonical = root
                    .canonicalize()
                    .with_context(|| format!("failed to canonicalize watch root: {}", root.display()))?;
                Ok(Self::Folder { root: canonical, extensions })
            }
        }
    }

    /// Directory handed to the OS watcher.
    pub fn watch_path(&self) -> &Path {
        match self {
            Self::File(path) => path.parent().unwrap_or(path),
            Self::Folder { root, .. } => root,
        }
    }

    fn recursive_mode(&self) -> RecursiveMode {
        match self {
            Self::File(_) => RecursiveMode::NonRecursive,
            Self::Folder { .. } => RecursiveMode::Recursive,
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        match self {
            Self::File(file) => path == file,
            Self::Folder { root, extensions } => {
                if !has_accepted_extension(path, extensions) {
                    return false;
                }
                if path.starts_with(root) {
                    true
                } else {
                    warn!(path = %path.display(), "ignoring event outside watch root (possible symlink escape)");
                    false
                }
            }
        }
    }
}

/// Capacity for the internal event channel.
const EVENT_CHANNEL_CAPACITY: usize = 512;

/// OS-native watcher (fsevents on macOS, inotify on Linux). Dropping it stops
/// event delivery and closes the receiver.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    target: WatchTarget,
}

impl FileWatcher {
    /// Start watching `target`. Returns the handle and a receiver for
    /// filtered events.
    pub fn start(target: WatchTarget) -> Result<(Self, mpsc::Receiver<RawFsEvent>)> {
        let target = target.canonicalize()?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let filter = target.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let observed_at = Instant::now();
                if let Some(raw_events) = translate_event(&event, &filter, observed_at) {
                    for raw in raw_events {
                        if tx.blocking_send(raw).is_err() {
                            debug!("event channel closed, stopping event dispatch");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "file watcher error");
            }
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(target.watch_path(), target.recursive_mode())
            .with_context(|| format!("failed to watch {}", target.watch_path().display()))?;

        debug!(path = %target.watch_path().display(), "file watcher started");

        Ok((Self { _watcher: watcher, target }, rx))
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }
}

/// Translate a `notify::Event` into zero or more `RawFsEvent`s.
fn translate_event(
    event: &Event,
    target: &WatchTarget,
    observed_at: Instant,
) -> Option<Vec<RawFsEvent>> {
    let (kind, paths): (FsEventKind, &[PathBuf]) = match &event.kind {
        EventKind::Create(_) => (FsEventKind::Create, event.paths.as_slice()),
        EventKind::Modify(ModifyKind::Metadata(_)) => {
            trace!("skipping metadata-only modify event");
            return None;
        }
        // A rename carrying both ends reports the destination only.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            (FsEventKind::Modify, event.paths.last().map(std::slice::from_ref).unwrap_or_default())
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => (FsEventKind::Remove, event.paths.as_slice()),
        EventKind::Modify(_) => (FsEventKind::Modify, event.paths.as_slice()),
        EventKind::Remove(_) => (FsEventKind::Remove, event.paths.as_slice()),
        _ => {
            trace!(kind = ?event.kind, "skipping non-content event");
            return None;
        }
    };

    let events: Vec<RawFsEvent> = paths
        .iter()
        .filter(|p| target.accepts(p))
        .map(|p| RawFsEvent { kind, path: p.clone(), observed_at })
        .collect();

    if events.is_empty() {
        None
    } else {
        Some(events)
    }
}
