use std::env;
use std::path::PathBuf;
use std::time::Duration;

use gridnest_collab::{ServerConfig, StoreConfig};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:5174)
    pub bind_addr: String,
    /// Config document path (default: .liveedit.config.json)
    pub config_path: PathBuf,
    /// Storage read/write deadline (default: 5000ms)
    pub io_timeout: Duration,
    /// Broadcast buffer per subscriber (default: 256)
    pub broadcast_capacity: usize,
    /// CORS allowed origins (comma-separated, empty = any)
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let bind_addr = lookup("GRIDNEST_BIND").unwrap_or(defaults.bind_addr);
        let config_path = lookup("GRIDNEST_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.store.path);

        let io_timeout = match lookup("GRIDNEST_IO_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidIoTimeout(raw))?,
            ),
            None => defaults.store.io_timeout,
        };

        let broadcast_capacity = match lookup("GRIDNEST_BROADCAST_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidBroadcastCapacity(raw)),
            },
            None => defaults.broadcast_capacity,
        };

        let cors_origins = lookup("GRIDNEST_CORS_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            bind_addr,
            config_path,
            io_timeout,
            broadcast_capacity,
            cors_origins,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr.clone(),
            store: StoreConfig {
                path: self.config_path.clone(),
                io_timeout: self.io_timeout,
            },
            broadcast_capacity: self.broadcast_capacity,
            cors_origins: self.cors_origins.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidIoTimeout(String),
    InvalidBroadcastCapacity(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidIoTimeout(v) => {
                write!(f, "GRIDNEST_IO_TIMEOUT_MS must be milliseconds, got {v:?}")
            }
            ConfigError::InvalidBroadcastCapacity(v) => {
                write!(f, "GRIDNEST_BROADCAST_CAPACITY must be a positive integer, got {v:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
