use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::ws::ServerMessage;

/// Observable sync state of a buffer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Buffer equals the last synced content.
    Clean,
    /// Local edits are pending.
    Dirty,
    /// An external change arrived while the buffer was dirty.
    Conflicted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BufferMode {
    ReadOnly,
    Editing,
}

/// The three user choices offered for a conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepMine,
    TakeTheirs,
    Cancel,
}

/// External content for the buffer's file, as delivered by the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingChange {
    pub content: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<ServerMessage> for IncomingChange {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::FileChanged { content, occurred_at, .. } => {
                Self { content, occurred_at }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    /// The buffer took the new content without asking.
    Adopted,
    /// The buffer was dirty; the change is held until the user resolves it.
    ConflictRaised,
    /// Stale or identical to what the buffer already has.
    Ignored,
}

/// Content the caller must send to the server's save endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveIntent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Keep mine: save this content, then call [`EditBuffer::mark_saved`].
    Save(SaveIntent),
    /// Take theirs: the buffer now holds the external content.
    Adopted,
    /// Cancel: the conflict stays open.
    Deferred,
    NothingToResolve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    Proceed(SaveIntent),
    NothingToSave,
    /// A conflict is open; the three-way choice must be made first.
    NeedsResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    Proceed,
    UnsavedChanges,
    NeedsResolution,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("buffer is read-only")]
    ReadOnly,
}

/// One browser tab's view of one file.
#[derive(Debug, Clone)]
pub struct EditBuffer {
    current_text: String,
    last_synced_text: String,
    last_synced_at: Option<DateTime<Utc>>,
    mode: BufferMode,
    pending_conflict: Option<IncomingChange>,
}

impl EditBuffer {
    /// A read-only buffer holding freshly fetched content.
    pub fn new(content: impl Into<String>, synced_at: Option<DateTime<Utc>>) -> Self {
        let content = content.into();
        Self {
            current_text: content.clone(),
            last_synced_text: content,
            last_synced_at: synced_at,
            mode: BufferMode::ReadOnly,
            pending_conflict: None,
        }
    }

    pub fn state(&self) -> SyncState {
        if self.pending_conflict.is_some() {
            SyncState::Conflicted
        } else if self.is_dirty() {
            SyncState::Dirty
        } else {
            SyncState::Clean
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.current_text != self.last_synced_text
    }

    pub fn mode(&self) -> BufferMode {
        self.mode
    }

    pub fn current_text(&self) -> &str {
        &self.current_text
    }

    pub fn last_synced_text(&self) -> &str {
        &self.last_synced_text
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn pending_conflict(&self) -> Option<&IncomingChange> {
        self.pending_conflict.as_ref()
    }

    /// Switching to read-only keeps unsaved edits; they stay dirty until
    /// saved or discarded.
    pub fn set_mode(&mut self, mode: BufferMode) {
        self.mode = mode;
    }

    pub fn edit(&mut self, text: impl Into<String>) -> Result<SyncState, EditError> {
        if self.mode == BufferMode::ReadOnly {
            return Err(EditError::ReadOnly);
        }
        self.current_text = text.into();
        Ok(self.state())
    }

    /// Drop local edits and any open conflict.
    pub fn discard_edits(&mut self) {
        self.current_text = self.last_synced_text.clone();
        self.pending_conflict = None;
    }

    /// Replace the buffer with content fetched from the server.
    pub fn load(&mut self, content: impl Into<String>, synced_at: Option<DateTime<Utc>>) {
        let mode = self.mode;
        *self = Self::new(content, synced_at);
        self.mode = mode;
    }

    pub fn apply_remote(&mut self, change: IncomingChange) -> RemoteOutcome {
        if self.last_synced_at.is_some_and(|synced_at| change.occurred_at < synced_at) {
            return RemoteOutcome::Ignored;
        }

        match self.state() {
            SyncState::Clean => {
                if change.content == self.last_synced_text {
                    return RemoteOutcome::Ignored;
                }
                self.adopt(change);
                RemoteOutcome::Adopted
            }
            SyncState::Dirty => {
                if change.content == self.last_synced_text {
                    return RemoteOutcome::Ignored;
                }
                if change.content == self.current_text {
                    // Disk caught up with the buffer.
                    self.last_synced_text = change.content;
                    self.last_synced_at = Some(change.occurred_at);
                    return RemoteOutcome::Adopted;
                }
                self.pending_conflict = Some(change);
                RemoteOutcome::ConflictRaised
            }
            SyncState::Conflicted => {
                // Latest external content wins the pending slot.
                self.pending_conflict = Some(change);
                RemoteOutcome::ConflictRaised
            }
        }
    }

    pub fn resolve(&mut self, resolution: Resolution) -> ResolutionOutcome {
        if self.pending_conflict.is_none() {
            return ResolutionOutcome::NothingToResolve;
        }

        match resolution {
            Resolution::KeepMine => {
                self.pending_conflict = None;
                ResolutionOutcome::Save(SaveIntent { content: self.current_text.clone() })
            }
            Resolution::TakeTheirs => {
                if let Some(change) = self.pending_conflict.take() {
                    self.adopt(change);
                }
                ResolutionOutcome::Adopted
            }
            Resolution::Cancel => ResolutionOutcome::Deferred,
        }
    }

    pub fn request_save(&self) -> SaveDecision {
        match self.state() {
            SyncState::Conflicted => SaveDecision::NeedsResolution,
            SyncState::Dirty => {
                SaveDecision::Proceed(SaveIntent { content: self.current_text.clone() })
            }
            SyncState::Clean => SaveDecision::NothingToSave,
        }
    }

    /// Record a successful save of `content`. Edits made while the save was in
    /// flight remain dirty.
    pub fn mark_saved(&mut self, content: &str, saved_at: DateTime<Utc>) {
        self.last_synced_text = content.to_string();
        self.last_synced_at = Some(saved_at);
    }

    /// Tab switch or file change.
    pub fn request_leave(&self) -> LeaveDecision {
        match self.state() {
            SyncState::Conflicted => LeaveDecision::NeedsResolution,
            SyncState::Dirty => LeaveDecision::UnsavedChanges,
            SyncState::Clean => LeaveDecision::Proceed,
        }
    }

    fn adopt(&mut self, change: IncomingChange) {
        self.current_text = change.content.clone();
        self.last_synced_text = change.content;
        self.last_synced_at = Some(change.occurred_at);
    }
}
