//! Loading [`Settings`] from configuration files and the environment.
//!
//! ## Loading order
//!
//! 1. Start from [`Settings::default`].
//! 2. Merge a TOML or JSON document over the defaults (keys that are absent
//!    keep their default values, nested tables merge key by key).
//! 3. Apply `STRATA_*` environment variable overrides.
//!
//! | Env var | Setting |
//! |---|---|
//! | `STRATA_DEBUG` | `debug` |
//! | `STRATA_LOG_LEVEL` | `log_level` |
//! | `STRATA_DATABASE_PATH` | `database.path` |
//! | `STRATA_DATABASE_JOURNAL_MODE` | `database.journal_mode` |
//! | `STRATA_DATABASE_FOREIGN_KEYS` | `database.foreign_keys` |
//! | `STRATA_PASSWORD_HASHER` | `auth.password_hasher` |
//! | `STRATA_ADMIN_PER_PAGE` | `admin.per_page` |
//!
//! ```rust,no_run
//! use strata_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("strata.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::StrataError;
use crate::settings::Settings;

/// Loads settings from a TOML string merged over the defaults.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, StrataError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| StrataError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, StrataError> {
    from_toml_str(&read_config(path.as_ref(), "TOML")?)
}

/// Loads settings from a TOML file, then applies environment overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, StrataError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string merged over the defaults.
pub fn from_json_str(json_str: &str) -> Result<Settings, StrataError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| StrataError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from a JSON file.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, StrataError> {
    from_json_str(&read_config(path.as_ref(), "JSON")?)
}

/// Loads settings from a JSON file, then applies environment overrides.
pub fn from_json_file_with_env(path: impl AsRef<Path>) -> Result<Settings, StrataError> {
    let mut settings = from_json_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Builds settings from the defaults plus environment overrides.
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `STRATA_*` environment variable overrides in place.
///
/// Boolean variables accept "true", "1", or "yes" (case-insensitive); any other
/// value is false. Unparseable numbers are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("STRATA_DEBUG") {
        settings.debug = parse_flag(&val);
    }

    if let Some(val) = lookup("STRATA_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("STRATA_DATABASE_PATH") {
        settings.database.path = PathBuf::from(val);
    }

    if let Some(val) = lookup("STRATA_DATABASE_JOURNAL_MODE") {
        settings.database.journal_mode = val.to_lowercase();
    }

    if let Some(val) = lookup("STRATA_DATABASE_FOREIGN_KEYS") {
        settings.database.foreign_keys = parse_flag(&val);
    }

    if let Some(val) = lookup("STRATA_PASSWORD_HASHER") {
        settings.auth.password_hasher = val.to_lowercase();
    }

    if let Some(val) = lookup("STRATA_ADMIN_PER_PAGE") {
        if let Ok(per_page) = val.parse::<u64>() {
            settings.admin.per_page = per_page;
        }
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "true" | "1" | "yes")
}

fn read_config(path: &Path, format: &str) -> Result<String, StrataError> {
    std::fs::read_to_string(path).map_err(|e| {
        StrataError::ConfigurationError(format!(
            "Failed to read {format} file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(value: serde_json::Value, format: &str) -> Result<Settings, StrataError> {
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        StrataError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;
    serde_json::from_value(merge_json(default_json, value)).map_err(|e| {
        StrataError::ConfigurationError(format!("Failed to deserialize settings from {format}: {e}"))
    })
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges `override_val` into `base`; objects merge key by key.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = match base_map.remove(&key) {
                    Some(base_v) => merge_json(base_v, override_v),
                    None => override_v,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}
