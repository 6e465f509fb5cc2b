// Full watcher pipeline: FS event → throttle → read → suppression → broadcast.
//
// Connects the watcher stages into a single async task that turns external
// edits into `file_changed` notifications for every live session.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use quire_common::protocol::ws::{ChangeNotification, ServerMessage};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use crate::error::ReadError;
use crate::hash::sha256_hex;
use crate::hub::{BroadcastReport, NotificationHub};
use crate::store::FileStore;

use super::throttle::{ReadyChange, Throttle, ThrottleConfig};
use super::RawFsEvent;

/// Default window after one of our own writes during which events for the
/// same file are treated as echoes.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(500);

/// How we map an absolute path reported by the watcher to its store.
pub trait StoreResolver: Send + Sync {
    /// The store for `path` and its wire-level file name (None in
    /// single-file mode). None if the path is not a tracked document.
    fn resolve(&self, path: &Path) -> Option<(Arc<FileStore>, Option<String>)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub throttle: ThrottleConfig,
    pub suppression_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { throttle: ThrottleConfig::default(), suppression_window: DEFAULT_SUPPRESSION_WINDOW }
    }
}

/// What happened to one throttled change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    Broadcast(BroadcastReport),
    /// Not a document this server tracks.
    Untracked,
    /// Echo of our own save: inside the suppression window and identical to
    /// what we wrote.
    SelfWrite,
    /// Content equals the last known on-disk state.
    Unchanged,
    /// Deleted, mid-write or not UTF-8; skipped for this cycle.
    Unreadable,
}

enum Snapshot {
    Untracked,
    SelfWrite,
    Unreadable(ReadError),
    Read { store: Arc<FileStore>, file: Option<String>, content: String },
}

/// Runs the watcher pipeline until `shutdown` fires or `raw_rx` closes
/// (watcher dropped).
pub async fn run_pipeline(
    mut raw_rx: mpsc::Receiver<RawFsEvent>,
    resolver: Arc<dyn StoreResolver>,
    hub: Arc<NotificationHub>,
    config: PipelineConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut throttle = Throttle::new(config.throttle.clone());

    info!(
        throttle_ms = config.throttle.interval.as_millis() as u64,
        suppression_window_ms = config.suppression_window.as_millis() as u64,
        "watcher pipeline started"
    );

    loop {
        let next_deadline = throttle.next_deadline();

        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                info!("watcher pipeline shutting down");
                break;
            }

            maybe_event = raw_rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        trace!(path = %event.path.display(), kind = ?event.kind, "raw event received");
                        throttle.push(event);
                    }
                    None => {
                        info!("raw event channel closed, pipeline exiting");
                        break;
                    }
                }
            }

            _ = sleep_until(next_deadline) => {}
        }

        for change in throttle.drain_ready() {
            let path = change.path.clone();
            let outcome = process_ready(change, &resolver, &hub, config.suppression_window).await;
            trace!(path = %path.display(), ?outcome, "throttled change processed");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Read a throttled change and broadcast it unless it is an echo of our own
/// write or repeats the last known content.
pub async fn process_ready(
    change: ReadyChange,
    resolver: &Arc<dyn StoreResolver>,
    hub: &NotificationHub,
    suppression_window: Duration,
) -> EmitOutcome {
    let resolver = Arc::clone(resolver);
    let path = change.path.clone();
    let last_observed_at = change.last_observed_at;

    let snapshot = tokio::task::spawn_blocking(move || {
        let Some((store, file)) = resolver.resolve(&path) else {
            return Snapshot::Untracked;
        };
        let content = match store.read() {
            Ok(content) => content,
            Err(error) => return Snapshot::Unreadable(error),
        };
        // Inside the window only our own bytes count as an echo; a different
        // external write landing right after a save still goes out.
        if store.is_recent_self_write(last_observed_at, suppression_window)
            && store.last_write_hash().as_deref() == Some(sha256_hex(content.as_bytes()).as_str())
        {
            return Snapshot::SelfWrite;
        }
        Snapshot::Read { store, file, content }
    })
    .await;

    let (store, file, content) = match snapshot {
        Ok(Snapshot::Read { store, file, content }) => (store, file, content),
        Ok(Snapshot::Untracked) => return EmitOutcome::Untracked,
        Ok(Snapshot::SelfWrite) => {
            debug!(path = %change.path.display(), "suppressed echo of own write");
            return EmitOutcome::SelfWrite;
        }
        Ok(Snapshot::Unreadable(error)) => {
            debug!(path = %change.path.display(), %error, "skipping unreadable change");
            return EmitOutcome::Unreadable;
        }
        Err(error) => {
            warn!(path = %change.path.display(), %error, "watcher read task failed");
            return EmitOutcome::Unreadable;
        }
    };

    if !store.note_observed(&sha256_hex(content.as_bytes())) {
        trace!(path = %change.path.display(), "content matches last known state");
        return EmitOutcome::Unchanged;
    }

    let message: ServerMessage =
        ChangeNotification { file, content, occurred_at: Utc::now() }.into();
    let report = hub.broadcast(&message).await;
    debug!(
        path = %change.path.display(),
        events = change.events,
        delivered = report.delivered,
        dropped = report.dropped,
        "change broadcast"
    );
    EmitOutcome::Broadcast(report)
}
