//! API server configuration.
//!
//! Loaded from `api.toml` in the platform config directory, then overridden
//! by `TOKO_*` environment variables:
//! - `TOKO_BIND_ADDRESS` - listen address (default: 127.0.0.1)
//! - `TOKO_PORT` - listen port (default: 8080)
//! - `TOKO_DATABASE_PATH` - SQLite file (default: platform data dir / toko.db)
//! - `TOKO_MAX_CONNECTIONS` - pool size (default: 5)

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("id", "toko", "toko")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("toko.db"))
        .unwrap_or_else(|| PathBuf::from("toko.db"))
}
fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// SQLite pool size. Writers still serialize on the database lock.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            bind_address: default_bind_address(),
            port: default_port(),
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl ApiConfig {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path.or_else(|| project_dirs().map(|d| d.config_dir().join("api.toml")));
        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading API config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "API config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("TOKO_BIND_ADDRESS") {
            self.bind_address = value;
        }
        if let Ok(value) = std::env::var("TOKO_DATABASE_PATH") {
            self.database_path = PathBuf::from(value);
        }
        if let Ok(raw) = std::env::var("TOKO_PORT") {
            match raw.parse() {
                Ok(port) => self.port = port,
                Err(_) => warn!(value = %raw, "Ignoring invalid TOKO_PORT"),
            }
        }
        if let Ok(raw) = std::env::var("TOKO_MAX_CONNECTIONS") {
            match raw.parse() {
                Ok(max) => self.max_connections = max,
                Err(_) => warn!(value = %raw, "Ignoring invalid TOKO_MAX_CONNECTIONS"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("bind_address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.toml");
        std::fs::write(&path, "port = 9090\ndatabase_path = \"/tmp/toko-test.db\"\n").unwrap();

        let config = ApiConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.database_path, PathBuf::from("/tmp/toko-test.db"));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_rejects_bad_address() {
        let config = ApiConfig {
            bind_address: "not an address".into(),
            ..ApiConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
