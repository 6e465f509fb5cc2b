// Core domain types shared between the daemon and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the server edits a single file or a directory of files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    File,
    Folder,
}

impl EditorMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
        }
    }
}

/// Stat-level information about a document, returned with every read and save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMetadata {
    /// Absolute path on disk.
    pub path: String,
    /// Path relative to the workspace root (folder mode only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl FileMetadata {
    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }
}

/// A node of the workspace file tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileTreeNode {
    Folder {
        name: String,
        /// Relative path of the folder; empty for the root.
        path: String,
        children: Vec<FileTreeNode>,
    },
    File {
        name: String,
        path: String,
    },
}

impl FileTreeNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Folder { path, .. } | Self::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder { .. })
    }

    /// Child nodes; empty for files.
    pub fn children(&self) -> &[FileTreeNode] {
        match self {
            Self::Folder { children, .. } => children,
            Self::File { .. } => &[],
        }
    }

    /// Relative paths of every file below this node, depth first.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_file_paths(&mut out);
        out
    }

    fn collect_file_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::File { path, .. } => out.push(path),
            Self::Folder { children, .. } => {
                for child in children {
                    child.collect_file_paths(out);
                }
            }
        }
    }
}
