// Locked, atomic access to a single markdown file.
//
// Readers take a shared advisory lock and writers an exclusive one on a
// sibling `<name>.lock` artifact, never on the data file itself, so the rename
// that publishes a write never invalidates a held lock. Writes go through a
// same-directory temp file and a rename, so a reader sees the old content or
// the new content and nothing in between.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use quire_common::types::FileMetadata;
use tracing::{debug, trace, warn};

use crate::error::{ReadError, WriteError};
use crate::hash::{sha256_hex, ContentHash};

/// Extension appended to the data file name to form the lock artifact.
pub const LOCK_SUFFIX: &str = ".lock";

/// Result of [`FileStore::cleanup`]. Callers are free to discard it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Removed,
    /// This instance did not create the artifact, so it is left alone.
    NotOwned,
    AlreadyGone,
    Failed,
}

#[derive(Debug, Clone)]
struct WriteRecord {
    completed_at: Instant,
    hash: ContentHash,
}

#[derive(Debug, Default)]
struct Bookkeeping {
    lock_artifact_owned: bool,
    last_write: Option<WriteRecord>,
    last_known_hash: Option<ContentHash>,
}

/// Handle for one file on disk. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    state: Mutex<Bookkeeping>,
}

/// `notes.md` → `notes.md.lock`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(LOCK_SUFFIX);
    path.with_file_name(name)
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = lock_path_for(&path);
        Self { path, lock_path, state: Mutex::new(Bookkeeping::default()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Read the whole file as UTF-8 under a shared lock.
    pub fn read(&self) -> Result<String, ReadError> {
        let lock = self.open_lock_artifact().map_err(|source| match source.kind() {
            // Parent directory is gone, so the file is too.
            io::ErrorKind::NotFound => ReadError::Missing { path: self.path.clone() },
            _ => ReadError::Lock { path: self.lock_path.clone(), source },
        })?;
        FileExt::lock_shared(&lock)
            .map_err(|source| ReadError::Lock { path: self.lock_path.clone(), source })?;

        let result = fs::read_to_string(&self.path).map_err(|e| ReadError::from_io(&self.path, e));

        let _ = FileExt::unlock(&lock);
        trace!(path = %self.path.display(), ok = result.is_ok(), "file read");
        result
    }

    /// Replace the file's content atomically under an exclusive lock.
    ///
    /// The parent directory is created when missing. On failure the target is
    /// untouched and the temp file is removed.
    pub fn write(&self, content: &str) -> Result<(), WriteError> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir)
            .map_err(|source| WriteError::Io { path: dir.to_path_buf(), source })?;

        let lock = self
            .open_lock_artifact()
            .map_err(|source| WriteError::Lock { path: self.lock_path.clone(), source })?;
        FileExt::lock_exclusive(&lock)
            .map_err(|source| WriteError::Lock { path: self.lock_path.clone(), source })?;

        let result = self
            .replace_contents(dir, content)
            .map_err(|source| WriteError::Io { path: self.path.clone(), source });

        let _ = FileExt::unlock(&lock);
        result?;

        let hash = sha256_hex(content.as_bytes());
        let mut state = self.state();
        state.last_write = Some(WriteRecord { completed_at: Instant::now(), hash: hash.clone() });
        state.last_known_hash = Some(hash);
        drop(state);

        debug!(path = %self.path.display(), bytes = content.len(), "file written");
        Ok(())
    }

    /// Stat the file without taking a lock.
    pub fn metadata(&self) -> Result<FileMetadata, ReadError> {
        let stat = fs::metadata(&self.path).map_err(|e| ReadError::from_io(&self.path, e))?;
        let modified = stat.modified().map_err(|e| ReadError::from_io(&self.path, e))?;
        // Birth time is unavailable on some filesystems.
        let created = stat.created().unwrap_or(modified);

        Ok(FileMetadata {
            path: self.path.display().to_string(),
            relative_path: None,
            size_bytes: stat.len(),
            modified_at: DateTime::<Utc>::from(modified),
            created_at: DateTime::<Utc>::from(created),
        })
    }

    /// Remove the lock artifact if this instance created it. Never panics and
    /// is safe to call repeatedly.
    pub fn cleanup(&self) -> CleanupOutcome {
        let mut state = self.state();
        if !state.lock_artifact_owned {
            return CleanupOutcome::NotOwned;
        }
        state.lock_artifact_owned = false;
        drop(state);

        match fs::remove_file(&self.lock_path) {
            Ok(()) => {
                debug!(path = %self.lock_path.display(), "lock artifact removed");
                CleanupOutcome::Removed
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
            Err(error) => {
                warn!(path = %self.lock_path.display(), %error, "failed to remove lock artifact");
                CleanupOutcome::Failed
            }
        }
    }

    /// When this instance's most recent write finished.
    pub fn last_write_completed_at(&self) -> Option<Instant> {
        self.state().last_write.as_ref().map(|record| record.completed_at)
    }

    /// Hash of the content this instance last wrote.
    pub fn last_write_hash(&self) -> Option<ContentHash> {
        self.state().last_write.as_ref().map(|record| record.hash.clone())
    }

    /// True when a write by this instance completed within `window` of
    /// `observed_at`, in either direction. An event can be stamped slightly
    /// before the write records its completion.
    pub fn is_recent_self_write(&self, observed_at: Instant, window: Duration) -> bool {
        let Some(completed_at) = self.last_write_completed_at() else {
            return false;
        };
        let gap = if observed_at >= completed_at {
            observed_at - completed_at
        } else {
            completed_at - observed_at
        };
        gap <= window
    }

    /// Record `hash` as the current on-disk state. Returns false when it
    /// already was.
    pub fn note_observed(&self, hash: &str) -> bool {
        let mut state = self.state();
        if state.last_known_hash.as_deref() == Some(hash) {
            return false;
        }
        state.last_known_hash = Some(hash.to_string());
        true
    }

    fn state(&self) -> MutexGuard<'_, Bookkeeping> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Open the lock artifact, creating it if needed. Ownership is claimed
    /// only when this call is the one that created it.
    fn open_lock_artifact(&self) -> io::Result<File> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(file) => {
                    self.state().lock_artifact_owned = true;
                    return Ok(file);
                }
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
                Err(error) => return Err(error),
            }

            match OpenOptions::new().read(true).write(true).open(&self.lock_path) {
                Ok(file) => return Ok(file),
                // Another process cleaned it up between our two opens.
                Err(error) if error.kind() == io::ErrorKind::NotFound && attempts < 3 => {}
                Err(error) => return Err(error),
            }
        }
    }

    fn replace_contents(&self, dir: &Path, content: &str) -> io::Result<()> {
        let name = self.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        temp.write_all(content.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|error| error.error)?;
        Ok(())
    }
}
