//! User configuration
//!
//! TOML files are merged in order, later files overriding earlier keys:
//!
//! 1. `$XDG_CONFIG_DIRS/repofetch/config.toml` (default `/etc/xdg`)
//! 2. `$XDG_CONFIG_HOME/repofetch/config.toml`
//!
//! ```toml
//! timeout_secs = 60
//! parallel = 4
//! user_agent = "repofetch"
//!
//! [servers."github.example.com"]
//! token = "..."
//! api_url = "https://github.example.com/api/v3"
//! ```
//!
//! Missing files are fine; every key has a default.

use crate::service::github::api_base_for;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PARALLEL: usize = 3;
pub const DEFAULT_USER_AGENT: &str = concat!("repofetch/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigToml {
    timeout_secs: Option<u64>,
    parallel: Option<usize>,
    user_agent: Option<String>,
    servers: Option<BTreeMap<String, ServerToml>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ServerToml {
    token: Option<String>,
    api_url: Option<String>,
}

impl ConfigToml {
    fn merge(&mut self, other: ConfigToml) {
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.parallel.is_some() {
            self.parallel = other.parallel;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        match (self.servers.as_mut(), other.servers) {
            (Some(dst), Some(src)) => {
                for (host, server) in src {
                    match dst.get_mut(&host) {
                        Some(existing) => existing.merge(server),
                        None => {
                            dst.insert(host, server);
                        }
                    }
                }
            }
            (None, Some(src)) => self.servers = Some(src),
            _ => {}
        }
    }
}

impl ServerToml {
    fn merge(&mut self, other: ServerToml) {
        if other.token.is_some() {
            self.token = other.token;
        }
        if other.api_url.is_some() {
            self.api_url = other.api_url;
        }
    }
}

/// Per-server connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub token: Option<String>,
    pub api_url: Option<String>,
}

/// Resolved configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub parallel: usize,
    pub user_agent: String,
    servers: BTreeMap<String, ServerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: http_timeout(),
            parallel: DEFAULT_PARALLEL,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            servers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load from the standard XDG locations.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&find_config_files())
    }

    /// Merge the given files in order. Nonexistent paths are skipped.
    pub fn load_from(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut merged = ConfigToml::default();
        for path in paths {
            if !path.exists() {
                continue;
            }
            merged.merge(read_toml(path)?);
        }

        let mut config = Self::default();
        if let Some(secs) = merged.timeout_secs {
            config.timeout = Duration::from_secs(clamp_timeout(secs));
        }
        if let Some(parallel) = merged.parallel {
            config.parallel = parallel.max(1);
        }
        if let Some(user_agent) = merged.user_agent {
            config.user_agent = user_agent;
        }
        config.servers = merged
            .servers
            .unwrap_or_default()
            .into_iter()
            .map(|(host, server)| {
                (
                    host,
                    ServerConfig {
                        token: server.token,
                        api_url: server.api_url,
                    },
                )
            })
            .collect();

        Ok(config)
    }

    pub fn server(&self, host: &str) -> ServerConfig {
        self.servers.get(host).cloned().unwrap_or_default()
    }

    /// Token for `host`: the configured one, else `GITHUB_TOKEN`.
    pub fn token(&self, host: &str) -> Option<String> {
        self.server(host)
            .token
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }

    /// API base URL for `host`: the configured one, else derived from the host.
    pub fn api_base(&self, host: &str) -> String {
        self.server(host)
            .api_url
            .unwrap_or_else(|| api_base_for(host))
    }
}

fn clamp_timeout(secs: u64) -> u64 {
    secs.clamp(5, 300)
}

/// HTTP timeout from `REPOFETCH_HTTP_TIMEOUT`, clamped to 5..=300 seconds.
pub fn http_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let secs = std::env::var("REPOFETCH_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(clamp_timeout(secs))
    })
}

fn split_xdg_config_dirs() -> Vec<PathBuf> {
    let raw = std::env::var("XDG_CONFIG_DIRS").unwrap_or_else(|_| "/etc/xdg".to_owned());
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn xdg_config_home() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".").join(".config"))
}

fn read_toml(path: &Path) -> Result<ConfigToml, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Candidate config files, lowest precedence first.
pub fn find_config_files() -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = split_xdg_config_dirs()
        .into_iter()
        .map(|dir| dir.join("repofetch").join("config.toml"))
        .collect();
    paths.push(xdg_config_home().join("repofetch").join("config.toml"));
    paths
}
