//! Database values.
//!
//! [`Value`] is the currency passed between models, the query compiler, and
//! the backend. SQLite only knows NULL, INTEGER, REAL, TEXT, and BLOB, so the
//! richer variants are narrowed at the storage boundary by
//! [`Value::to_storage`] and widened again on read by field-aware code.

use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// A backend-agnostic database value.
///
/// # Examples
///
/// ```
/// use strata_db::value::Value;
///
/// assert_eq!(Value::from(42_i64), Value::Int(42));
/// assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
/// assert_eq!(Value::from(None::<bool>), Value::Null);
/// assert_eq!(Value::from(true).to_storage(), Value::Int(1));
/// ```
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A boolean, stored as 0/1.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit float.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// A calendar date, stored as `YYYY-MM-DD`.
    Date(NaiveDate),
    /// A UTC timestamp, stored as RFC 3339 text.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Narrows this value to what SQLite stores: booleans become 0/1 and
    /// dates become ISO text. Other variants are unchanged.
    #[must_use]
    pub fn to_storage(&self) -> Self {
        match self {
            Self::Bool(b) => Self::Int(i64::from(*b)),
            Self::Date(d) => Self::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => Self::String(format_datetime(dt)),
            other => other.clone(),
        }
    }

    /// Converts this value to JSON for transport.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::json!(i),
            Self::Float(f) => serde_json::json!(f),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => serde_json::Value::String(format_datetime(dt)),
        }
    }

    /// Returns the SQL literal for this value, as used in `DEFAULT` clauses.
    ///
    /// Strings are single-quoted with embedded quotes doubled.
    pub fn sql_literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(b) => i64::from(*b).to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(_) | Self::Date(_) | Self::DateTime(_) => {
                format!("'{}'", self.to_string().replace('\'', "''"))
            }
        }
    }
}

/// Formats a timestamp the way it is stored: RFC 3339 with microseconds.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp. Accepts RFC 3339 and SQLite's
/// `YYYY-MM-DD HH:MM:SS` form (interpreted as UTC).
pub fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses a stored `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
        }
    }
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
