// Relative document paths: normalization and extension checks.

pub mod normalize;

pub use normalize::{normalize_relative_path, PathError};

use std::path::Path;

/// Extensions treated as markdown documents when none are configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Returns true if `path` ends in one of `extensions` (case-insensitive,
/// without the leading dot).
pub fn has_accepted_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|accepted| accepted.as_ref().eq_ignore_ascii_case(ext)))
}
