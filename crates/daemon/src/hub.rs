// Live session registry and fan-out for change notifications.
//
// Each session owns a bounded queue drained by its WebSocket task. Broadcast
// encodes once and never waits: a session whose queue is full or closed is
// dropped, which closes its socket, and the rest are unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use quire_common::protocol::ws::ServerMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

pub type SessionId = Uuid;

/// One encoded frame shared by every recipient.
pub type Frame = Arc<str>;

/// Outbound queue depth per session.
pub const SESSION_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
struct ClientSession {
    sender: mpsc::Sender<Frame>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Debug, Default)]
pub struct NotificationHub {
    sessions: RwLock<HashMap<SessionId, ClientSession>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self) -> (SessionId, mpsc::Receiver<Frame>) {
        let (sender, receiver) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, ClientSession { sender, connected_at: Utc::now() });
        debug!(session_id = %id, sessions = sessions.len(), "live session registered");
        (id, receiver)
    }

    /// Returns false if the session was already gone.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.write().await.remove(&id);
        if let Some(session) = &removed {
            let connected_ms = (Utc::now() - session.connected_at).num_milliseconds();
            debug!(session_id = %id, connected_ms, "live session unregistered");
        }
        removed.is_some()
    }

    pub async fn broadcast(&self, message: &ServerMessage) -> BroadcastReport {
        let frame: Frame = match serde_json::to_string(message) {
            Ok(encoded) => encoded.into(),
            Err(error) => {
                warn!(%error, "failed to encode live message");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                match session.sender.try_send(Arc::clone(&frame)) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => failed.push((*id, "queue full")),
                    Err(TrySendError::Closed(_)) => failed.push((*id, "connection closed")),
                }
            }
        }

        if !failed.is_empty() {
            let mut sessions = self.sessions.write().await;
            for (id, reason) in failed {
                if sessions.remove(&id).is_some() {
                    report.dropped += 1;
                    warn!(session_id = %id, reason, "dropping live session");
                }
            }
        }

        report
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
