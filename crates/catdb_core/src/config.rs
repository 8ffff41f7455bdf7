//! Runtime configuration read from the environment.
//!
//! | Variable          | Meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `CATDB_DB_PATH`   | SQLite file; in-memory when unset         |
//! | `CATDB_LOG_LEVEL` | trace, debug, info, warn or error         |
//! | `CATDB_LOG_DIR`   | absolute directory for rolling log files  |

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::default_log_level;
use rusqlite::Connection;
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "CATDB_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "CATDB_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "CATDB_LOG_DIR";

/// Settings shared by the library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Loads settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let defaults = Self::default();
        Self {
            db_path: read(DB_PATH_VAR).map(PathBuf::from),
            log_level: read(LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        }
    }

    /// Opens the configured database, or an in-memory one.
    pub fn open_connection(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }
}
