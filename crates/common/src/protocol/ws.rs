// Live-channel message types for the notify-only WebSocket feed.
//
// The feed is one-way: the server pushes, clients never send application
// messages. Each frame is a single JSON text message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Path of the live notification endpoint.
pub const LIVE_CHANNEL_PATH: &str = "/ws";

/// All message types pushed over the live channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A watched file changed on disk through something other than this server.
    FileChanged {
        /// Workspace-relative path; absent in single-file mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<String>,
        /// Full file content at emission time.
        content: String,
        occurred_at: DateTime<Utc>,
    },
}

/// A change notification as produced by the watcher, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub file: Option<String>,
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<ChangeNotification> for ServerMessage {
    fn from(notification: ChangeNotification) -> Self {
        Self::FileChanged {
            file: notification.file,
            content: notification.content,
            occurred_at: notification.occurred_at,
        }
    }
}
