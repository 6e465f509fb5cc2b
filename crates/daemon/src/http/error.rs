// HTTP error envelope and the error code registry.

use std::future::Future;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quire_common::protocol::api::{ErrorBody, ErrorEnvelope};

use crate::error::{ImageError, LookupError, ManageError, ReadError, ValidationError, WriteError};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationFailed,
    NotFound,
    AlreadyExists,
    ReadFailed,
    WriteFailed,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::ReadFailed => "READ_FAILED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            Self::ValidationFailed => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists => StatusCode::CONFLICT,
            Self::ReadFailed | Self::WriteFailed | Self::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub const fn retryable(self) -> bool {
        matches!(self, Self::ReadFailed | Self::WriteFailed | Self::InternalError)
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ValidationFailed => "request validation failed",
            Self::NotFound => "requested file not found",
            Self::AlreadyExists => "path already exists",
            Self::ReadFailed => "server could not read the file",
            Self::WriteFailed => "server could not write the file",
            Self::InternalError => "internal server error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = current_request_id();
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
                retryable: self.code.retryable(),
                request_id: request_id.clone(),
            },
        };

        let mut response = (self.code.status(), Json(envelope)).into_response();
        if let Some(request_id) = request_id {
            attach_request_id_header(&mut response, &request_id);
        }
        response
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::new(ErrorCode::ValidationFailed, error.to_string())
    }
}

impl From<LookupError> for ApiError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::Validation(error) => error.into(),
            LookupError::NotFound(error) => Self::new(ErrorCode::NotFound, error.to_string()),
        }
    }
}

impl From<ReadError> for ApiError {
    fn from(error: ReadError) -> Self {
        match error {
            ReadError::Missing { .. } => Self::new(ErrorCode::NotFound, error.to_string()),
            _ => Self::new(ErrorCode::ReadFailed, error.to_string()),
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(error: WriteError) -> Self {
        Self::new(ErrorCode::WriteFailed, error.to_string())
    }
}

impl From<ManageError> for ApiError {
    fn from(error: ManageError) -> Self {
        match error {
            ManageError::Validation(error) => error.into(),
            ManageError::NotFound(error) => Self::new(ErrorCode::NotFound, error.to_string()),
            ManageError::AlreadyExists { .. } => {
                Self::new(ErrorCode::AlreadyExists, error.to_string())
            }
            ManageError::Io { .. } => Self::new(ErrorCode::WriteFailed, error.to_string()),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(error: ImageError) -> Self {
        match error {
            ImageError::UnsupportedFormat(_) | ImageError::Empty | ImageError::TooLarge { .. } => {
                Self::new(ErrorCode::ValidationFailed, error.to_string())
            }
            ImageError::Validation(error) => error.into(),
            ImageError::NotFound(error) => Self::new(ErrorCode::NotFound, error.to_string()),
            ImageError::Io { .. } => Self::new(ErrorCode::InternalError, error.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        Self::new(ErrorCode::ValidationFailed, error.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::new(ErrorCode::ValidationFailed, rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(ErrorCode::ValidationFailed, rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        tracing::error!(%error, "blocking file task failed");
        Self::from_code(ErrorCode::InternalError)
    }
}

pub async fn with_request_id_scope<F>(request_id: String, future: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, future).await
}

pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

pub fn attach_request_id_header(response: &mut Response, request_id: &str) {
    if let Ok(header) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header);
    }
}
