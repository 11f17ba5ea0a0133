//! Configuration
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.
//!
//! ```text
//! kvgate /run/kv/store.sock 8080
//! kvgate --config kvgate.toml --root ./public
//! ```

use crate::backend::{BackendConfig, DEFAULT_MAX_DATAGRAM};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments
#[derive(Parser, Debug, Default)]
#[command(name = "kvgate")]
#[command(version)]
#[command(about = "File server and key-value proxy for a local datagram backend", long_about = None)]
pub struct CliArgs {
    /// Path of the key-value backend's datagram socket
    pub backend: Option<PathBuf>,

    /// Port to listen on
    pub port: Option<u16>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Directory files are served from
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// How long to wait for a backend reply, in milliseconds (0 = forever)
    #[arg(long)]
    pub backend_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: Option<u16>,
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            root: default_root(),
        }
    }
}

/// Backend-related configuration
#[derive(Debug, Deserialize)]
pub struct BackendSection {
    pub socket: Option<PathBuf>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_datagram")]
    pub max_datagram: usize,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_ms: default_timeout_ms(),
            max_datagram: default_max_datagram(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_datagram() -> usize {
    DEFAULT_MAX_DATAGRAM
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub root: PathBuf,
    pub backend: BackendConfig,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = match cli.config {
            Some(ref path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                toml::from_str(&contents).map_err(|source| ConfigError::TomlParse {
                    path: path.clone(),
                    source,
                })?
            }
            None => TomlConfig::default(),
        };

        Self::merge(cli, toml_config)
    }

    /// Merges CLI args over TOML values.
    pub fn merge(cli: CliArgs, file: TomlConfig) -> Result<Self, ConfigError> {
        let socket_path = cli
            .backend
            .or(file.backend.socket)
            .ok_or(ConfigError::MissingBackend)?;
        let port = cli.port.or(file.server.port).ok_or(ConfigError::MissingPort)?;

        let timeout_ms = cli.backend_timeout_ms.unwrap_or(file.backend.timeout_ms);
        let backend = BackendConfig {
            socket_path,
            timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            max_datagram: file.backend.max_datagram,
        };

        Ok(Config {
            host: cli.host.unwrap_or(file.server.host),
            port,
            root: cli.root.unwrap_or(file.server.root),
            backend,
            log_level: cli.log_level.unwrap_or(file.logging.level),
        })
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("no backend socket path given (positional BACKEND or [backend] socket)")]
    MissingBackend,

    #[error("no port given (positional PORT or [server] port)")]
    MissingPort,
}
