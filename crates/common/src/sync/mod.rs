// Client-side reconciliation between an edit buffer and on-disk content.
//
// The server never merges. It accepts every save and pushes every external
// change; deciding what happens to a dirty buffer is up to the user, and the
// state machine here is what a client runs to make that decision explicit.

pub mod buffer;

pub use buffer::{
    BufferMode, EditBuffer, EditError, IncomingChange, LeaveDecision, RemoteOutcome, Resolution,
    ResolutionOutcome, SaveDecision, SaveIntent, SyncState,
};
