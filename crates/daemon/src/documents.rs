// The set of documents a server instance edits: one file or one folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quire_common::types::{EditorMode, FileMetadata};

use crate::error::{LookupError, ReadError, ValidationError};
use crate::images::{ImageStore, IMAGES_DIR_NAME};
use crate::store::{CleanupOutcome, FileStore};
use crate::watcher::pipeline::StoreResolver;
use crate::watcher::WatchTarget;
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub enum Documents {
    Single(Arc<FileStore>),
    Folder(Arc<Workspace>),
}

impl Documents {
    /// Open a single markdown file. The file must exist.
    pub fn single(path: &Path) -> Result<Self, ReadError> {
        let path = path.canonicalize().map_err(|e| ReadError::from_io(path, e))?;
        if !path.is_file() {
            return Err(ReadError::Missing { path });
        }
        Ok(Self::Single(Arc::new(FileStore::new(path))))
    }

    pub fn folder(workspace: Workspace) -> Self {
        Self::Folder(Arc::new(workspace))
    }

    pub fn mode(&self) -> EditorMode {
        match self {
            Self::Single(_) => EditorMode::File,
            Self::Folder(_) => EditorMode::Folder,
        }
    }

    /// Directory the watcher observes.
    pub fn watch_root(&self) -> PathBuf {
        match self {
            Self::Single(store) => {
                store.path().parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
            }
            Self::Folder(workspace) => workspace.root().to_path_buf(),
        }
    }

    /// Watch target for this document set.
    pub fn watch_target(&self) -> WatchTarget {
        match self {
            Self::Single(store) => WatchTarget::File(store.path().to_path_buf()),
            Self::Folder(workspace) => WatchTarget::Folder {
                root: workspace.root().to_path_buf(),
                extensions: workspace.extensions().to_vec(),
            },
        }
    }

    /// Upload directory: `images/` beside the file, or under the folder root.
    pub fn images(&self) -> ImageStore {
        ImageStore::new(self.watch_root().join(IMAGES_DIR_NAME))
    }

    pub fn workspace(&self) -> Option<&Arc<Workspace>> {
        match self {
            Self::Single(_) => None,
            Self::Folder(workspace) => Some(workspace),
        }
    }

    /// Resolve the optional `file` request parameter to a store. Folder mode
    /// requires it; single-file mode ignores it.
    pub fn lookup(&self, file: Option<&str>) -> Result<Arc<FileStore>, LookupError> {
        match self {
            Self::Single(store) => Ok(Arc::clone(store)),
            Self::Folder(workspace) => {
                let relative = file
                    .filter(|value| !value.trim().is_empty())
                    .ok_or(ValidationError::FileRequired)?;
                workspace.handle_for(relative)
            }
        }
    }

    /// Stat `store` and attach its workspace-relative path in folder mode.
    pub fn metadata_for(&self, store: &FileStore) -> Result<FileMetadata, ReadError> {
        let metadata = store.metadata()?;
        match self {
            Self::Single(_) => Ok(metadata),
            Self::Folder(workspace) => Ok(match workspace.relative_path_of(store.path()) {
                Some(relative) => metadata.with_relative_path(relative),
                None => metadata,
            }),
        }
    }

    /// Release every lock artifact this process created.
    pub fn cleanup(&self) -> usize {
        match self {
            Self::Single(store) => usize::from(store.cleanup() == CleanupOutcome::Removed),
            Self::Folder(workspace) => workspace.cleanup(),
        }
    }
}

impl StoreResolver for Documents {
    fn resolve(&self, path: &Path) -> Option<(Arc<FileStore>, Option<String>)> {
        match self {
            Self::Single(store) => (path == store.path()).then(|| (Arc::clone(store), None)),
            Self::Folder(workspace) => {
                let relative = workspace.relative_path_of(path)?;
                let store = workspace.handle_for(&relative).ok()?;
                Some((store, Some(relative)))
            }
        }
    }
}
