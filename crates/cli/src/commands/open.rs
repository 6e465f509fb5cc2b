// `quire open`: serve a markdown file or folder until interrupted.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use quire_common::path::has_accepted_extension;
use quire_daemon::config::GlobalConfig;
use quire_daemon::documents::Documents;
use quire_daemon::http::shutdown_signal;
use quire_daemon::runtime::start_server;
use quire_daemon::workspace::Workspace;
use tracing::{info, warn};

use super::CliError;

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Markdown file or directory to edit.
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Host interface to bind.
    #[arg(long)]
    host: Option<String>,

    /// Preferred start port; auto-increments when occupied.
    #[arg(long)]
    port: Option<u16>,

    /// Do not open a browser window.
    #[arg(long)]
    no_browser: bool,
}

impl OpenArgs {
    pub(crate) fn for_path(path: PathBuf) -> Self {
        Self { path, host: None, port: None, no_browser: false }
    }
}

pub fn run(args: OpenArgs, mut config: GlobalConfig) -> anyhow::Result<()> {
    let documents = resolve_documents(&args.path, &config.watcher.extensions)?;
    apply_overrides(&mut config, &args);
    let target = args.path.display().to_string();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(documents, config, &target))
}

async fn serve(documents: Documents, config: GlobalConfig, target: &str) -> anyhow::Result<()> {
    let handle = start_server(documents, &config).await?;
    let url = browser_url(handle.local_addr());

    println!("Opening {target} at {url}");
    if config.server.open_browser {
        let browser_url = url.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(error) = webbrowser::open(&browser_url) {
                warn!(%error, url = %browser_url, "failed to open browser");
            }
        });
    }

    shutdown_signal().await;
    info!(url = %url, "stopping server");
    handle.wait().await;
    Ok(())
}

/// A file opens in single-file mode, a directory in folder mode.
fn resolve_documents(path: &Path, extensions: &[String]) -> anyhow::Result<Documents> {
    let resolved = match path.canonicalize() {
        Ok(resolved) => resolved,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(CliError::NotFound(path.to_path_buf()).into());
        }
        Err(error) => {
            return Err(error).with_context(|| format!("failed to resolve {}", path.display()));
        }
    };

    if resolved.is_dir() {
        let workspace = Workspace::open(&resolved)
            .with_context(|| format!("failed to open folder {}", resolved.display()))?
            .with_extensions(extensions.to_vec());
        return Ok(Documents::folder(workspace));
    }

    if resolved.is_file() && has_accepted_extension(&resolved, extensions) {
        return Documents::single(&resolved)
            .with_context(|| format!("failed to open {}", resolved.display()));
    }

    Err(CliError::Unsupported(resolved).into())
}

fn apply_overrides(config: &mut GlobalConfig, args: &OpenArgs) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.no_browser {
        config.server.open_browser = false;
    }
}

/// A wildcard bind is reachable on loopback; browsers cannot open `0.0.0.0`.
fn browser_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}
