// Local configuration for the server.
//
// Global config: `~/.quire/config.toml`, overridden by `QUIRE_*` environment
// variables, overridden in turn by CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::watcher::pipeline::PipelineConfig;
use crate::watcher::throttle::ThrottleConfig;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_THROTTLE_MS: u64 = 200;
const DEFAULT_SUPPRESSION_WINDOW_MS: u64 = 500;
const MAX_SUPPRESSION_WINDOW_MS: u64 = 5000;

/// Root directory for global state: `~/.quire/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".quire"))
}

/// Path to the global config file: `~/.quire/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GlobalConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub server: ServerConfig,
    pub watcher: WatcherConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.into(),
            server: ServerConfig::default(),
            watcher: WatcherConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// Preferred port; the server moves to the next free one when taken.
    pub port: u16,
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: DEFAULT_HOST.into(), port: DEFAULT_PORT, open_browser: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatcherConfig {
    pub throttle_ms: u64,
    pub suppression_window_ms: u64,
    /// Accepted document extensions, without the leading dot.
    pub extensions: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE_MS,
            suppression_window_ms: DEFAULT_SUPPRESSION_WINDOW_MS,
            extensions: vec!["md".into(), "markdown".into()],
        }
    }
}

impl WatcherConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            throttle: ThrottleConfig::with_millis(self.throttle_ms),
            suppression_window: Duration::from_millis(
                self.suppression_window_ms.min(MAX_SUPPRESSION_WINDOW_MS),
            ),
        }
    }
}

impl GlobalConfig {
    /// Load from `~/.quire/config.toml` and apply environment overrides.
    /// A missing or unparsable file yields defaults.
    pub fn load() -> Self {
        let mut config =
            global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default();
        config.apply_env();
        config
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_fn(|key| std::env::var(key));
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `QUIRE_HOST` | `server.host` |
    /// | `QUIRE_PORT` | `server.port` (ignored unless a valid port) |
    /// | `QUIRE_LOG_FILTER` | `log_filter` |
    pub fn apply_env_fn<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Result<String, std::env::VarError>,
    {
        if let Ok(host) = env("QUIRE_HOST") {
            if !host.trim().is_empty() {
                self.server.host = host.trim().to_string();
            }
        }
        if let Some(port) = env("QUIRE_PORT").ok().and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Ok(filter) = env("QUIRE_LOG_FILTER") {
            if !filter.trim().is_empty() {
                self.log_filter = filter;
            }
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from_map(
        map: HashMap<&'static str, &'static str>,
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> {
        move |key: &str| map.get(key).map(|v| v.to_string()).ok_or(std::env::VarError::NotPresent)
    }

    // ── GlobalConfig ───────────────────────────────────────────────

    #[test]
    fn defaults() {
        let cfg = GlobalConfig::default();
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.server.port, 8000);
        assert!(cfg.server.open_browser);
        assert_eq!(cfg.watcher.throttle_ms, 200);
        assert_eq!(cfg.watcher.suppression_window_ms, 500);
        assert_eq!(cfg.watcher.extensions, vec!["md", "markdown"]);
    }

    #[test]
    fn load_from_reads_every_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
log_filter = "quire_daemon=debug"

[server]
host = "0.0.0.0"
port = 9100
open_browser = false

[watcher]
suppression_window_ms = 800
extensions = ["md"]
"#,
        )
        .unwrap();

        let cfg = GlobalConfig::load_from(&path).unwrap();
        assert_eq!(cfg.log_filter, "quire_daemon=debug");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9100);
        assert!(!cfg.server.open_browser);
        assert_eq!(cfg.watcher.throttle_ms, 200);
        assert_eq!(cfg.watcher.suppression_window_ms, 800);
        assert_eq!(cfg.watcher.extensions, vec!["md"]);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: GlobalConfig = toml::from_str(
            r#"
[server]
port = 8123

[watcher]
throttle_ms = 350
"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 8123);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.watcher.throttle_ms, 350);
        assert_eq!(cfg.watcher.suppression_window_ms, 500);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, GlobalConfig::default());
    }

    #[test]
    fn load_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            GlobalConfig::load_from(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn load_garbage_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [").unwrap();
        assert!(matches!(GlobalConfig::load_from(&path), Err(ConfigError::Parse(_))));
    }

    // ── Environment overrides ──────────────────────────────────────

    #[test]
    fn env_overrides_host_port_and_filter() {
        let mut cfg = GlobalConfig::default();
        cfg.apply_env_fn(env_from_map(HashMap::from([
            ("QUIRE_HOST", "0.0.0.0"),
            ("QUIRE_PORT", "9000"),
            ("QUIRE_LOG_FILTER", "quire_daemon=debug"),
        ])));
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.log_filter, "quire_daemon=debug");
    }

    #[test]
    fn invalid_env_port_is_ignored() {
        let mut cfg = GlobalConfig::default();
        cfg.apply_env_fn(env_from_map(HashMap::from([("QUIRE_PORT", "not-a-port")])));
        assert_eq!(cfg.server.port, 8000);
    }

    // ── Pipeline tuning ────────────────────────────────────────────

    #[test]
    fn pipeline_config_clamps_values() {
        let watcher = WatcherConfig {
            throttle_ms: 1,
            suppression_window_ms: 60_000,
            extensions: vec!["md".into()],
        };
        let pipeline = watcher.pipeline_config();
        assert_eq!(pipeline.throttle.interval, Duration::from_millis(50));
        assert_eq!(pipeline.suppression_window, Duration::from_millis(5000));
    }
}
