//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TOKO_DEFAULT_MIN_STOCK=10                                          │
//! │     TOKO_REQUIRE_FULL_PAYMENT=false                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/toko/stock.toml (Linux)                                  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! default_min_stock = 5
//! expiry_horizon_days = 30
//! urgent_expiry_days = 7
//! movement_delete_window_hours = 24
//! invoice_retry_limit = 5
//! require_full_payment = true
//! alert_channel_capacity = 256
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use toko_core::{
    DEFAULT_EXPIRY_HORIZON_DAYS, DEFAULT_MIN_STOCK, INVOICE_RETRY_LIMIT,
    MAX_EXPIRY_HORIZON_DAYS, MOVEMENT_DELETE_WINDOW_HOURS, URGENT_EXPIRY_DAYS,
};

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_min_stock() -> i64 {
    DEFAULT_MIN_STOCK
}
fn default_expiry_horizon() -> i64 {
    DEFAULT_EXPIRY_HORIZON_DAYS
}
fn default_urgent_expiry() -> i64 {
    URGENT_EXPIRY_DAYS
}
fn default_delete_window() -> i64 {
    MOVEMENT_DELETE_WINDOW_HOURS
}
fn default_retry_limit() -> u32 {
    INVOICE_RETRY_LIMIT
}
fn default_true() -> bool {
    true
}
fn default_channel_capacity() -> usize {
    256
}

/// Inventory engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockConfig {
    /// Threshold given to a stock aggregate when it is first created.
    #[serde(default = "default_min_stock")]
    pub default_min_stock: i64,

    /// Days ahead an expiry scan looks.
    #[serde(default = "default_expiry_horizon")]
    pub expiry_horizon_days: i64,

    /// Batches expiring within this many days are urgent.
    #[serde(default = "default_urgent_expiry")]
    pub urgent_expiry_days: i64,

    /// Movements older than this cannot be deleted.
    #[serde(default = "default_delete_window")]
    pub movement_delete_window_hours: i64,

    /// Invoice numbers tried per sale before giving up.
    #[serde(default = "default_retry_limit")]
    pub invoice_retry_limit: u32,

    /// Reject sales where the payment is below the total.
    #[serde(default = "default_true")]
    pub require_full_payment: bool,

    /// Buffer of the alert broadcast channel.
    #[serde(default = "default_channel_capacity")]
    pub alert_channel_capacity: usize,
}

impl Default for StockConfig {
    fn default() -> Self {
        StockConfig {
            default_min_stock: default_min_stock(),
            expiry_horizon_days: default_expiry_horizon(),
            urgent_expiry_days: default_urgent_expiry(),
            movement_delete_window_hours: default_delete_window(),
            invoice_retry_limit: default_retry_limit(),
            require_full_payment: true,
            alert_channel_capacity: default_channel_capacity(),
        }
    }
}

impl StockConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stock.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading stock config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
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

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_min_stock < 0 {
            return Err(ConfigError::Invalid(
                "default_min_stock must not be negative".into(),
            ));
        }

        if self.urgent_expiry_days < 0
            || self.expiry_horizon_days < self.urgent_expiry_days
            || self.expiry_horizon_days > MAX_EXPIRY_HORIZON_DAYS
        {
            return Err(ConfigError::Invalid(format!(
                "expiry windows must satisfy 0 <= urgent ({}) <= horizon ({}) <= {}",
                self.urgent_expiry_days, self.expiry_horizon_days, MAX_EXPIRY_HORIZON_DAYS
            )));
        }

        if self.movement_delete_window_hours < 0
            || chrono::Duration::try_hours(self.movement_delete_window_hours).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "movement_delete_window_hours out of range: {}",
                self.movement_delete_window_hours
            )));
        }

        if self.invoice_retry_limit == 0 {
            return Err(ConfigError::Invalid(
                "invoice_retry_limit must be greater than 0".into(),
            ));
        }

        if self.alert_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "alert_channel_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        override_from_env("TOKO_DEFAULT_MIN_STOCK", &mut self.default_min_stock);
        override_from_env("TOKO_EXPIRY_HORIZON_DAYS", &mut self.expiry_horizon_days);
        override_from_env("TOKO_URGENT_EXPIRY_DAYS", &mut self.urgent_expiry_days);
        override_from_env(
            "TOKO_MOVEMENT_DELETE_WINDOW_HOURS",
            &mut self.movement_delete_window_hours,
        );
        override_from_env("TOKO_INVOICE_RETRY_LIMIT", &mut self.invoice_retry_limit);
        override_from_env("TOKO_REQUIRE_FULL_PAYMENT", &mut self.require_full_payment);
        override_from_env("TOKO_ALERT_CHANNEL_CAPACITY", &mut self.alert_channel_capacity);
    }

    /// `stock.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "toko", "toko").map(|dirs| dirs.config_dir().join("stock.toml"))
    }
}

/// Replaces `target` with the parsed value of `key` if it is set and valid.
fn override_from_env<T>(key: &str, target: &mut T)
where
    T: std::str::FromStr + std::fmt::Debug,
{
    if let Ok(raw) = std::env::var(key) {
        match raw.parse::<T>() {
            Ok(value) => {
                debug!(key, ?value, "Overriding config from environment");
                *target = value;
            }
            Err(_) => warn!(key, value = %raw, "Ignoring unparsable environment override"),
        }
    }
}
