//! # Ledger Configuration
//!
//! Where the usage database lives and how the pool is sized.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PROMO_DB_PATH=/var/lib/promo/promo.db                              │
//! │     PROMO_DB_MAX_CONNECTIONS=8                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/promo-ledger/config.toml (Linux)                         │
//! │     ~/Library/Application Support/com.promo.promo-ledger/config.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/promo/promo.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//! idle_timeout_secs = 600
//! run_migrations = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

/// Overrides the database file path.
pub const ENV_DB_PATH: &str = "PROMO_DB_PATH";

/// Overrides the pool's maximum connection count.
pub const ENV_DB_MAX_CONNECTIONS: &str = "PROMO_DB_MAX_CONNECTIONS";

// =============================================================================
// Database Settings
// =============================================================================

/// The `[database]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations when the pool opens.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "promo", "promo-ledger")
        .map(|dirs| dirs.data_dir().join("promo.db"))
        .unwrap_or_else(|| PathBuf::from("promo.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            run_migrations: default_true(),
        }
    }
}

// =============================================================================
// Ledger Config
// =============================================================================

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment and defaults.
    ///
    /// An explicitly given path must exist. The default path is optional.
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reads and parses a TOML file without applying overrides.
    pub fn from_file(path: &Path) -> DbResult<Self> {
        info!(?path, "Loading ledger config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DbResult<()> {
        let db = &self.database;

        if db.path.as_os_str().is_empty() {
            return Err(DbError::config("database.path must not be empty"));
        }

        if db.max_connections == 0 {
            return Err(DbError::config(
                "database.max_connections must be greater than 0",
            ));
        }

        if db.min_connections > db.max_connections {
            return Err(DbError::config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }

        Ok(())
    }

    /// Overrides values from the process environment.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup(ENV_DB_MAX_CONNECTIONS) {
            match max.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %max, "Ignoring invalid {}", ENV_DB_MAX_CONNECTIONS),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "promo", "promo-ledger")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Pool settings derived from the `[database]` section.
    pub fn db_config(&self) -> DbConfig {
        let db = &self.database;

        DbConfig::new(db.path.clone())
            .max_connections(db.max_connections)
            .min_connections(db.min_connections)
            .connect_timeout(Duration::from_secs(db.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(db.idle_timeout_secs))
            .run_migrations(db.run_migrations)
    }
}
