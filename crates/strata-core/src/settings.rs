//! Settings for a strata application.
//!
//! [`Settings`] is a plain value built at bootstrap (usually through
//! [`settings_loader`](crate::settings_loader)) and handed to the pieces that
//! need it: the database backend, the logging setup, the password hasher
//! selection, and the admin service.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// SQLite database configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Path to the database file, or `:memory:`.
    pub path: PathBuf,
    /// The `journal_mode` pragma applied on open (e.g. "wal", "delete").
    pub journal_mode: String,
    /// Whether `PRAGMA foreign_keys=ON` is applied on open.
    pub foreign_keys: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.sqlite3"),
            journal_mode: "wal".to_string(),
            foreign_keys: true,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// The hasher used for new passwords: "argon2" or "bcrypt".
    pub password_hasher: String,
    /// The bcrypt cost factor when `password_hasher` is "bcrypt".
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password_hasher: "argon2".to_string(),
            bcrypt_cost: 12,
        }
    }
}

/// Admin service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSettings {
    /// Default page size for list results.
    pub per_page: u64,
    /// Upper bound on a caller-requested page size.
    pub max_per_page: u64,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            per_page: 25,
            max_per_page: 100,
        }
    }
}

/// The complete set of application settings.
///
/// # Examples
///
/// ```
/// use strata_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.database.journal_mode, "wal");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The log filter directive (e.g. "info", "strata_db=debug").
    pub log_level: String,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Authentication configuration.
    pub auth: AuthSettings,
    /// Admin service configuration.
    pub admin: AdminSettings,
    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
            auth: AuthSettings::default(),
            admin: AdminSettings::default(),
            extra: HashMap::new(),
        }
    }
}
