// Folder-mode document set: discovery, containment, and handle caching.
//
// Every client-supplied path goes through two checks before any I/O: string
// normalization (no `..`, no absolute override) and a resolved comparison
// against the canonical root, which catches symlinks pointing outside.

pub mod tree;

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use quire_common::path::{has_accepted_extension, normalize_relative_path, DEFAULT_EXTENSIONS};
use quire_common::types::FileTreeNode;
use tracing::{debug, info, warn};

use crate::error::{LookupError, ManageError, NotFoundError, ReadError, ValidationError};
use crate::store::{CleanupOutcome, FileStore};

#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    extensions: Vec<String>,
    handles: Mutex<HashMap<String, Arc<FileStore>>>,
}

impl Workspace {
    /// Open `root` as a workspace. The path is canonicalized and must be a
    /// directory.
    pub fn open(root: &Path) -> Result<Self, ReadError> {
        let root = root.canonicalize().map_err(|e| ReadError::from_io(root, e))?;
        if !root.is_dir() {
            return Err(ReadError::Io {
                path: root,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        Ok(Self {
            root,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the accepted extensions (without leading dot).
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        if !extensions.is_empty() {
            self.extensions = extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect();
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Relative paths (`/`-separated) of every accepted file under the root,
    /// sorted case-insensitively with the raw string as tie-break.
    pub fn list_files(&self, extensions: Option<&[&str]>) -> Result<Vec<String>, ReadError> {
        let configured: Vec<&str> = self.extensions.iter().map(String::as_str).collect();
        let extensions = extensions.unwrap_or(&configured);

        let mut files = Vec::new();
        self.collect_files(&self.root, extensions, &mut files)
            .map_err(|e| ReadError::from_io(&self.root, e))?;
        files.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        Ok(files)
    }

    /// Nested view of [`Self::list_files`].
    pub fn file_tree(&self) -> Result<FileTreeNode, ReadError> {
        let files = self.list_files(None)?;
        let root_name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        Ok(tree::build(&root_name, &files))
    }

    /// Cached handle for an existing accepted file inside the workspace.
    /// Paths that resolve to the same file (a symlink and its target) share
    /// one handle.
    pub fn handle_for(&self, relative: &str) -> Result<Arc<FileStore>, LookupError> {
        let (requested, absolute) = self.resolve(relative)?;
        self.require_extension(&requested, &absolute)?;
        if !absolute.is_file() {
            return Err(NotFoundError { path: requested }.into());
        }

        let key = self.cache_key(requested, &absolute);
        let mut handles = self.handles();
        let store = handles
            .entry(key)
            .or_insert_with(|| Arc::new(FileStore::new(absolute)))
            .clone();
        Ok(store)
    }

    /// Whether [`Self::handle_for`] would succeed. Creates nothing.
    pub fn validate(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok((key, absolute)) => {
                self.require_extension(&key, &absolute).is_ok() && absolute.is_file()
            }
            Err(_) => false,
        }
    }

    /// Release lock artifacts of every cached handle. Returns how many were
    /// removed.
    pub fn cleanup(&self) -> usize {
        let handles: Vec<Arc<FileStore>> = self.handles().values().cloned().collect();
        let removed = handles
            .iter()
            .filter(|store| store.cleanup() == CleanupOutcome::Removed)
            .count();
        debug!(root = %self.root.display(), handles = handles.len(), removed, "workspace cleaned up");
        removed
    }

    /// Map an absolute path (as reported by the watcher) back to a relative
    /// path inside the workspace.
    pub fn relative_path_of(&self, absolute: &Path) -> Option<String> {
        let relative = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Create an empty accepted file. Parent directories are created.
    pub fn create_file(&self, relative: &str) -> Result<Arc<FileStore>, ManageError> {
        let (key, absolute) = self.resolve(relative)?;
        self.require_extension(&key, &absolute)?;
        if absolute.exists() {
            return Err(ManageError::AlreadyExists { path: key });
        }

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ManageError::Io { path: parent.to_path_buf(), source })?;
        }
        OpenOptions::new().write(true).create_new(true).open(&absolute).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                ManageError::AlreadyExists { path: key.clone() }
            } else {
                ManageError::Io { path: absolute.clone(), source }
            }
        })?;

        info!(path = %key, "file created");
        Ok(self.handle_for(&key)?)
    }

    /// Rename a file or folder within its parent. Returns the new relative
    /// path. A symlink is renamed itself, not its target.
    pub fn rename_path(&self, relative: &str, new_name: &str) -> Result<String, ManageError> {
        let new_name = validate_new_name(new_name)?;
        let (requested, absolute) = self.resolve(relative)?;
        if !absolute.exists() {
            return Err(NotFoundError { path: requested }.into());
        }

        let is_file = absolute.is_file();
        let source = self.root.join(&requested);
        let destination = source.with_file_name(new_name);
        if is_file {
            self.require_extension(new_name, &destination)?;
        }
        if destination.symlink_metadata().is_ok() {
            return Err(ManageError::AlreadyExists { path: new_name.to_string() });
        }

        // Release artifacts before they move with the directory.
        self.evict(&self.cache_key(requested.clone(), &absolute), !is_file);

        fs::rename(&source, &destination)
            .map_err(|error| ManageError::Io { path: source.clone(), source: error })?;

        let renamed = match requested.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/{new_name}"),
            None => new_name.to_string(),
        };
        info!(from = %requested, to = %renamed, "path renamed");
        Ok(renamed)
    }

    /// Delete a single file. Directories are refused. A symlink is removed
    /// itself, not its target.
    pub fn delete_file(&self, relative: &str) -> Result<(), ManageError> {
        let (requested, absolute) = self.resolve(relative)?;
        if absolute.is_dir() {
            return Err(ValidationError::NotAFile(requested).into());
        }
        if !absolute.exists() {
            return Err(NotFoundError { path: requested }.into());
        }

        let link = self.root.join(&requested);
        fs::remove_file(&link)
            .map_err(|source| ManageError::Io { path: link.clone(), source })?;
        if !absolute.exists() {
            self.evict(&self.cache_key(requested.clone(), &absolute), false);
        }

        info!(path = %requested, "file deleted");
        Ok(())
    }

    /// Normalize `relative` and resolve it under the root. Returns the
    /// normalized request and the resolved absolute path.
    fn resolve(&self, relative: &str) -> Result<(String, PathBuf), ValidationError> {
        let normalized = normalize_relative_path(relative)?;
        let candidate = self.root.join(&normalized);
        let resolved = resolve_existing_prefix(&candidate)
            .map_err(|_| ValidationError::OutsideRoot(normalized.clone()))?;

        if !resolved.starts_with(&self.root) {
            warn!(path = %normalized, "rejected path outside workspace root");
            return Err(ValidationError::OutsideRoot(normalized));
        }
        Ok((normalized, resolved))
    }

    /// Handles are keyed by the resolved file, falling back to the request
    /// when the resolved path cannot be expressed relative to the root.
    fn cache_key(&self, requested: String, resolved: &Path) -> String {
        self.relative_path_of(resolved).unwrap_or(requested)
    }

    fn require_extension(&self, display: &str, path: &Path) -> Result<(), ValidationError> {
        if has_accepted_extension(path, &self.extensions) {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedExtension(display.to_string()))
        }
    }

    /// Drop cached handles for `key` (and everything below it for folders)
    /// and release their artifacts.
    fn evict(&self, key: &str, include_children: bool) {
        let prefix = format!("{key}/");
        let evicted: Vec<Arc<FileStore>> = {
            let mut handles = self.handles();
            let keys: Vec<String> = handles
                .keys()
                .filter(|k| k.as_str() == key || (include_children && k.starts_with(&prefix)))
                .cloned()
                .collect();
            keys.iter().filter_map(|k| handles.remove(k)).collect()
        };
        for store in evicted {
            let _ = store.cleanup();
        }
    }

    fn collect_files(&self, dir: &Path, extensions: &[&str], out: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if let Err(error) = self.collect_files(&path, extensions, out) {
                    warn!(path = %path.display(), %error, "skipping unreadable directory");
                }
                continue;
            }

            if !has_accepted_extension(&path, extensions) {
                continue;
            }

            if file_type.is_symlink() {
                // Linked files count only when they resolve to a regular file
                // inside the root. Linked directories are not descended.
                match path.canonicalize() {
                    Ok(target) if target.starts_with(&self.root) && target.is_file() => {}
                    _ => continue,
                }
            } else if !file_type.is_file() {
                continue;
            }

            if let Some(relative) = self.relative_path_of(&path) {
                out.push(relative);
            }
        }
        Ok(())
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, Arc<FileStore>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// rest, so paths that do not exist yet can still be containment-checked.
fn resolve_existing_prefix(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut remainder = Vec::new();

    while !existing.exists() && existing.symlink_metadata().is_err() {
        let Some(name) = existing.file_name() else {
            break;
        };
        remainder.push(name.to_os_string());
        if !existing.pop() {
            break;
        }
    }

    let mut resolved = existing.canonicalize()?;
    for part in remainder.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

fn validate_new_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    if trimmed.contains(['/', '\\', '\0']) {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}
