// REST handlers for reading, saving and managing documents.
//
// File I/O takes advisory locks and may block, so every handler moves its
// work onto the blocking pool.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quire_common::protocol::api::{
    ContentResponse, CreateFileRequest, FileQuery, ImageUploadResponse, ModeResponse,
    PathResponse, RenameRequest, SaveRequest, SaveResponse, SaveStatus,
};
use quire_common::types::FileTreeNode;
use tracing::info;

use super::error::{ApiError, ErrorCode};
use super::AppState;
use crate::workspace::Workspace;

/// Multipart field carrying an uploaded image.
const IMAGE_FIELD: &str = "file";

pub async fn mode(State(state): State<AppState>) -> Json<ModeResponse> {
    Json(ModeResponse { mode: state.documents.mode() })
}

pub async fn file_tree(State(state): State<AppState>) -> Result<Json<FileTreeNode>, ApiError> {
    let workspace = require_workspace(&state, "file tree")?;
    let tree = tokio::task::spawn_blocking(move || workspace.file_tree()).await??;
    Ok(Json(tree))
}

pub async fn get_content(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Json<ContentResponse>, ApiError> {
    let documents = state.documents.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let store = documents.lookup(query.file.as_deref())?;
        let content = store.read()?;
        let metadata = documents.metadata_for(&store)?;
        Ok(ContentResponse { content, metadata })
    })
    .await??;
    Ok(Json(response))
}

pub async fn save(
    State(state): State<AppState>,
    payload: Result<Json<SaveRequest>, JsonRejection>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Json(request) = payload?;
    let documents = state.documents.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let store = documents.lookup(request.file.as_deref())?;
        store.write(&request.content)?;
        let metadata = documents.metadata_for(&store)?;
        Ok(SaveResponse { status: SaveStatus::Saved, metadata })
    })
    .await??;
    info!(
        path = %response.metadata.path,
        size_bytes = response.metadata.size_bytes,
        "document saved"
    );
    Ok(Json(response))
}

pub async fn create_file(
    State(state): State<AppState>,
    payload: Result<Json<CreateFileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PathResponse>), ApiError> {
    let Json(request) = payload?;
    let workspace = require_workspace(&state, "creating files")?;
    let path = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let store = workspace.create_file(&request.file)?;
        workspace
            .relative_path_of(store.path())
            .ok_or_else(|| ApiError::from_code(ErrorCode::InternalError))
    })
    .await??;
    info!(path = %path, "document created");
    Ok((StatusCode::CREATED, Json(PathResponse { path })))
}

pub async fn rename_path(
    State(state): State<AppState>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> Result<Json<PathResponse>, ApiError> {
    let Json(request) = payload?;
    let workspace = require_workspace(&state, "renaming files")?;
    let path = tokio::task::spawn_blocking(move || {
        workspace.rename_path(&request.file, &request.new_name)
    })
    .await??;
    info!(path = %path, "path renamed");
    Ok(Json(PathResponse { path }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<StatusCode, ApiError> {
    let workspace = require_workspace(&state, "deleting files")?;
    let file = query
        .file
        .filter(|file| !file.trim().is_empty())
        .ok_or_else(|| ApiError::new(ErrorCode::ValidationFailed, "missing 'file' parameter"))?;
    let removed = file.clone();
    tokio::task::spawn_blocking(move || workspace.delete_file(&file)).await??;
    info!(path = %removed, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(IMAGE_FIELD) {
            let name = field.file_name().map(str::to_string);
            upload = Some((name, field.bytes().await?));
            break;
        }
    }
    let (name, data) = upload.ok_or_else(|| {
        ApiError::new(ErrorCode::ValidationFailed, format!("missing '{IMAGE_FIELD}' field"))
    })?;

    let images = state.documents.images();
    let bytes = data.len();
    let stored = tokio::task::spawn_blocking(move || images.save(name.as_deref(), &data)).await??;
    info!(path = %stored.relative_path, bytes, "image uploaded");
    Ok(Json(ImageUploadResponse { path: stored.relative_path, filename: stored.filename }))
}

pub async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let images = state.documents.images();
    let served = tokio::task::spawn_blocking(move || images.load(&filename)).await??;
    Ok(([(header::CONTENT_TYPE, served.content_type)], served.bytes).into_response())
}

fn require_workspace(
    state: &AppState,
    operation: &str,
) -> Result<std::sync::Arc<Workspace>, ApiError> {
    state.documents.workspace().cloned().ok_or_else(|| {
        ApiError::new(
            ErrorCode::ValidationFailed,
            format!("{operation} is only available in folder mode"),
        )
    })
}
