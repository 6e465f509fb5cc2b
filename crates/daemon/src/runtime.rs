// Server lifecycle: bind, start the watcher pipeline, serve, shut down.
//
// Shutdown runs in a fixed order: the watcher pipeline stops and the OS
// watcher is dropped so no new change events arrive, then the HTTP server
// stops accepting and live sessions are closed, then every lock artifact this
// process created is removed.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::GlobalConfig;
use crate::documents::Documents;
use crate::http::{build_router, AppState};
use crate::hub::NotificationHub;
use crate::watcher::pipeline::{run_pipeline, StoreResolver};
use crate::watcher::FileWatcher;

/// How many consecutive ports to try before giving up.
const MAX_PORT_ATTEMPTS: u16 = 100;

pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Resolves once the server has fully stopped, without requesting it.
    pub async fn stopped(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                warn!(?error, "server task terminated unexpectedly");
            }
        }
    }

    /// Request shutdown and wait for cleanup to finish.
    pub async fn wait(self) {
        self.shutdown();
        self.stopped().await;
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Bind the first free port at or above the configured one, start watching
/// `documents`, and serve until the returned handle is shut down.
pub async fn start_server(documents: Documents, config: &GlobalConfig) -> Result<ServerHandle> {
    let listener = bind_with_fallback(&config.server.host, config.server.port).await?;
    let local_addr = listener.local_addr().context("failed to read bound address")?;

    let mode = documents.mode();
    let hub = Arc::new(NotificationHub::new());
    let (watcher, raw_rx) =
        FileWatcher::start(documents.watch_target()).context("failed to start file watcher")?;
    info!(path = %watcher.target().watch_path().display(), "watching documents");

    let (pipeline_shutdown_tx, pipeline_shutdown_rx) = broadcast::channel(1);
    let resolver: Arc<dyn StoreResolver> = Arc::new(documents.clone());
    let pipeline = tokio::spawn(run_pipeline(
        raw_rx,
        resolver,
        Arc::clone(&hub),
        config.watcher.pipeline_config(),
        pipeline_shutdown_rx,
    ));

    let state = AppState::new(documents.clone(), hub);
    let sessions_shutdown = state.shutdown.clone();
    let router = build_router(state);

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(4);
    let task = tokio::spawn(async move {
        let served = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                let _ = pipeline_shutdown_tx.send(());
                if let Err(error) = pipeline.await {
                    warn!(?error, "watcher pipeline terminated unexpectedly");
                }
                drop(watcher);
                let _ = sessions_shutdown.send(());
            })
            .await;
        if let Err(error) = served {
            warn!(%error, "http server terminated unexpectedly");
        }

        let removed = documents.cleanup();
        info!(lock_artifacts_removed = removed, "server stopped");
    });

    info!(listen_addr = %local_addr, mode = mode.as_str(), "server started");
    Ok(ServerHandle { local_addr, shutdown_tx, task: Some(task) })
}

async fn bind_with_fallback(host: &str, preferred: u16) -> Result<TcpListener> {
    // Port 0 lets the OS choose; nothing to walk.
    if preferred == 0 {
        return TcpListener::bind((host, 0))
            .await
            .with_context(|| format!("failed to bind {host}:0"));
    }

    let mut port = preferred;
    for _ in 0..MAX_PORT_ATTEMPTS {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if port != preferred {
                    info!(preferred, port, "preferred port busy, using next free port");
                }
                return Ok(listener);
            }
            Err(error) if error.kind() == io::ErrorKind::AddrInUse => {
                let Some(next) = port.checked_add(1) else {
                    break;
                };
                port = next;
            }
            Err(error) => {
                return Err(error).with_context(|| format!("failed to bind {host}:{port}"));
            }
        }
    }

    bail!("no free port on {host} starting at {preferred}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::store::lock_path_for;

    fn ephemeral_config() -> GlobalConfig {
        let mut config = GlobalConfig::default();
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn busy_preferred_port_moves_to_next() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.expect("placeholder listener should bind");
        let busy = taken.local_addr().expect("placeholder addr").port();

        let listener = bind_with_fallback("127.0.0.1", busy)
            .await
            .expect("fallback should find a free port");
        assert_ne!(listener.local_addr().expect("bound addr").port(), busy);
    }

    #[tokio::test]
    async fn shutdown_removes_lock_artifacts() {
        let tmp = TempDir::new().expect("tempdir should be created");
        let file = tmp.path().join("draft.md");
        std::fs::write(&file, "# v0").expect("fixture should be written");
        let documents = Documents::single(&file).expect("document should open");

        let handle = start_server(documents.clone(), &ephemeral_config())
            .await
            .expect("server should start");
        let store = documents.lookup(None).expect("store should resolve");
        store.write("# v1").expect("write should succeed");
        assert!(lock_path_for(store.path()).exists());

        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("server should stop");
        assert!(!lock_path_for(store.path()).exists());
        assert_eq!(std::fs::read_to_string(&file).expect("file should remain"), "# v1");
    }

    #[tokio::test]
    async fn healthz_is_served_on_bound_port() {
        let tmp = TempDir::new().expect("tempdir should be created");
        let documents = Documents::folder(
            crate::workspace::Workspace::open(tmp.path()).expect("workspace should open"),
        );
        let handle =
            start_server(documents, &ephemeral_config()).await.expect("server should start");

        let mut stream = tokio::net::TcpStream::connect(handle.local_addr())
            .await
            .expect("server should accept connections");
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .expect("request should be written");
        let mut response = String::new();
        stream.read_to_string(&mut response).await.expect("response should be read");
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));

        handle.wait().await;
    }
}
