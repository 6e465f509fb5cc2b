// Per-file storage: advisory locking and atomic replace.

pub mod file_store;

pub use file_store::{lock_path_for, CleanupOutcome, FileStore, LOCK_SUFFIX};
