// Relative path canonicalization: separator unification, traversal and
// absolute-path rejection, 1024 char max.
//
// This is the string half of containment checking. The daemon pairs it with a
// resolved-path comparison against the canonical workspace root, since a
// clean string can still escape through a symlink.

use thiserror::Error;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path must be relative to the workspace directory")]
    Absolute,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,

    #[error("path contains invalid component: {0}")]
    InvalidComponent(String),
}

/// Normalize a client-supplied path relative to a workspace root.
///
/// Rules:
/// - Reject null bytes and empty input
/// - Convert all separators to `/`
/// - Reject absolute paths (`/x`, `\\x`, `C:/x`)
/// - Collapse consecutive `/` and drop `.` components
/// - Reject `..` components
/// - Reject whitespace-only components
/// - Enforce max 1024 character limit (after normalization)
pub fn normalize_relative_path(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let unified = input.replace('\\', "/");

    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathError::Absolute);
    }

    let mut components = Vec::new();
    for component in unified.split('/') {
        match component {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal("..".to_string())),
            other if other.trim().is_empty() => {
                return Err(PathError::InvalidComponent("(whitespace-only component)".to_string()));
            }
            other => components.push(other),
        }
    }

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    let result = components.join("/");

    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
