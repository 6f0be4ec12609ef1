//! Runtime configuration
//!
//! `MenuTreeConfig` tells the store where the database lives and how long a
//! writer waits for the write lock before giving up with a transient error.
//! Hosts can embed it in their own settings file (it is serde-serializable) or
//! build it from the environment with [`MenuTreeConfig::from_env`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "MENUTREE_DB_PATH";

/// Environment variable overriding the busy timeout (milliseconds)
pub const BUSY_TIMEOUT_ENV: &str = "MENUTREE_BUSY_TIMEOUT_MS";

/// Default time a writer waits for the SQLite write lock
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTreeConfig {
    /// Path to the database file
    pub database_path: PathBuf,

    /// How long a connection waits on a locked database (ms)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// `~/.menutree/menutree.db`, or a relative path when no home directory is known
pub fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".menutree"))
        .unwrap_or_else(|| PathBuf::from(".menutree"))
        .join("menutree.db")
}

impl Default for MenuTreeConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl MenuTreeConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    pub fn with_busy_timeout_ms(mut self, busy_timeout_ms: u64) -> Self {
        self.busy_timeout_ms = busy_timeout_ms;
        self
    }

    /// Build config from `MENUTREE_DB_PATH` / `MENUTREE_BUSY_TIMEOUT_MS`.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_path = lookup(DB_PATH_ENV)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let busy_timeout_ms = lookup(BUSY_TIMEOUT_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(defaults.busy_timeout_ms);

        Self {
            database_path,
            busy_timeout_ms,
        }
    }
}
