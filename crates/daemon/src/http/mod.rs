// HTTP + WebSocket surface: router assembly and request middleware.

pub mod error;
pub mod routes;
pub mod ws;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use quire_common::protocol::ws::LIVE_CHANNEL_PATH;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::documents::Documents;
use crate::hub::NotificationHub;

use self::error::{attach_request_id_header, with_request_id_scope, REQUEST_ID_HEADER};

/// Markdown documents are sent whole on every save.
pub const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub documents: Documents,
    pub hub: Arc<NotificationHub>,
    /// Fires once when the server shuts down; live sessions close on it.
    pub shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(documents: Documents, hub: Arc<NotificationHub>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self { documents, hub, shutdown }
    }
}

pub fn build_router(state: AppState) -> Router {
    apply_middleware(
        Router::new()
            .route("/healthz", get(healthz))
            .route("/api/mode", get(routes::mode))
            .route("/api/file-tree", get(routes::file_tree))
            .route("/api/content", get(routes::get_content))
            .route("/api/save", post(routes::save))
            .route("/api/files", post(routes::create_file).delete(routes::delete_file))
            .route("/api/files/rename", post(routes::rename_path))
            .route("/api/images", post(routes::upload_image))
            .route("/images/{*filename}", get(routes::serve_image))
            .route(LIVE_CHANNEL_PATH, get(ws::ws_upgrade))
            .with_state(state),
    )
}

pub fn apply_middleware(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed is
/// logged and treated as never firing.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;
    attach_request_id_header(&mut response, &request_id);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
