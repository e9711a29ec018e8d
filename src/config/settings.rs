//! Ledger settings loading from ledger.toml
//!
//! This module loads the optional TOML settings file that tunes the connection
//! pool and decides what deleting a payout does to the orders it settled. Every
//! key has a default, so an absent file simply yields [`Settings::default`].

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Environment variable naming an alternative settings file.
pub const CONFIG_PATH_ENV: &str = "LEDGER_CONFIG";

/// Settings file used when `LEDGER_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Configuration structure representing the entire ledger.toml file
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Connection pool tuning
    pub database: DatabaseSettings,
    /// Payout lifecycle behavior
    pub payouts: PayoutSettings,
}

/// Connection pool settings for the process-wide database handle
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Seconds to wait for a connection before failing
    pub connect_timeout_secs: u64,
    /// Whether every SQL statement is logged through `tracing`
    pub sqlx_logging: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 8,
            sqlx_logging: false,
        }
    }
}

/// What happens to settled orders when their payout is deleted.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayoutDeletePolicy {
    /// Orders keep the balances the payout left them with.
    #[default]
    RetainOrderBalances,
    /// Every allocation is added back to its order's remaining amount.
    RestoreOrderBalances,
}

/// Payout settings
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PayoutSettings {
    /// Behavior of `delete_payout` towards the orders it settled
    pub delete_policy: PayoutDeletePolicy,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A key has the wrong type or an unknown enum value
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading ledger settings from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read settings file {}: {e}", path_ref.display()),
    })?;

    parse_settings(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

fn parse_settings(contents: &str) -> std::result::Result<Settings, toml::de::Error> {
    toml::from_str(contents)
}

/// Loads settings from `LEDGER_CONFIG` or `./ledger.toml`, falling back to
/// defaults when the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        warn!("Settings file {} not found, using defaults", path);
        return Ok(Settings::default());
    }
    load_settings(path)
}
