// Typed errors for file and workspace operations.

use std::io;
use std::path::{Path, PathBuf};

use quire_common::path::PathError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("file not found: {}", path.display())]
    Missing { path: PathBuf },

    #[error("file is not valid UTF-8: {}", path.display())]
    InvalidUtf8 { path: PathBuf },

    #[error("failed to acquire shared lock for {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReadError {
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::Missing { path: path.to_path_buf() },
            io::ErrorKind::InvalidData => Self::InvalidUtf8 { path: path.to_path_buf() },
            _ => Self::Io { path: path.to_path_buf(), source },
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to acquire exclusive lock for {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A client-supplied path or name was rejected before any I/O.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid path: {0}")]
    Path(#[from] PathError),

    #[error("path escapes the workspace root: {0}")]
    OutsideRoot(String),

    #[error("unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("file path is required in folder mode")]
    FileRequired,

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Error)]
#[error("file not found: {path}")]
pub struct NotFoundError {
    pub path: String,
}

/// Failure to resolve a relative path to a file handle.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

impl From<PathError> for LookupError {
    fn from(error: PathError) -> Self {
        Self::Validation(error.into())
    }
}

/// Failure of a create, rename or delete inside a workspace.
#[derive(Debug, Error)]
pub enum ManageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("path already exists: {path}")]
    AlreadyExists { path: String },

    #[error("failed to update {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to store or serve an uploaded image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("empty file uploaded")]
    Empty,
    #[error("image too large; maximum size is {} MB", limit / (1024 * 1024))]
    TooLarge { limit: usize },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("failed to access image {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<PathError> for ImageError {
    fn from(error: PathError) -> Self {
        Self::Validation(error.into())
    }
}

impl From<LookupError> for ManageError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::Validation(error) => Self::Validation(error),
            LookupError::NotFound(error) => Self::NotFound(error),
        }
    }
}
