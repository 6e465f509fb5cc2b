// HTTP request/response payloads.

use serde::{Deserialize, Serialize};

use crate::types::{EditorMode, FileMetadata};

/// Query string for `GET /api/content` and `DELETE /api/files`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentResponse {
    pub content: String,
    pub metadata: FileMetadata,
}

/// Body of `POST /api/save`. `file` is required in folder mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Saved,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveResponse {
    pub status: SaveStatus,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeResponse {
    pub mode: EditorMode,
}

/// Body of `POST /api/files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFileRequest {
    pub file: String,
}

/// Body of `POST /api/files/rename`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenameRequest {
    pub file: String,
    pub new_name: String,
}

/// Response for file management operations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathResponse {
    pub path: String,
}

/// Response for an image upload: `path` is relative to the document root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUploadResponse {
    pub path: String,
    pub filename: String,
}

/// Error envelope: `{"error": {"code", "message", "retryable"}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}
