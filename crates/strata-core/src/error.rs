//! Core error types for strata.
//!
//! [`StrataError`] is the single error enum shared by every crate in the
//! workspace. ORM code never swallows driver failures: they surface as
//! [`StrataError::DatabaseError`] or [`StrataError::IntegrityError`] and the
//! consuming layer decides how to report them.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// A validation failure, either for a single value or for a set of fields.
///
/// # Examples
///
/// ```
/// use strata_core::error::ValidationError;
///
/// let err = ValidationError::new("This field is required.", "required");
/// assert_eq!(err.to_string(), "This field is required.");
///
/// let mut fields = std::collections::BTreeMap::new();
/// fields.insert(
///     "email".to_string(),
///     vec![ValidationError::new("Enter a valid email address.", "invalid")],
/// );
/// let err = ValidationError::with_field_errors(fields);
/// assert!(err.to_string().contains("email"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the failure (e.g. "required", "max_length").
    pub code: String,
    /// Extra context for the message.
    pub params: BTreeMap<String, String>,
    /// Per-field errors, keyed by field name.
    pub field_errors: BTreeMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: BTreeMap::new(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: BTreeMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: "invalid".to_string(),
            params: BTreeMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the errors recorded for `field`, if any.
    pub fn errors_for(&self, field: &str) -> Option<&[Self]> {
        self.field_errors.get(field).map(Vec::as_slice)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            return write!(f, "{}", self.message);
        }
        let mut first = true;
        for (field, errors) in &self.field_errors {
            for error in errors {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {error}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The error type for every strata operation.
///
/// Each variant maps to an HTTP status code through [`StrataError::status_code`]
/// so that a transport layer can report failures without inspecting messages.
#[derive(Error, Debug)]
pub enum StrataError {
    // ── Caller errors ────────────────────────────────────────────────

    /// The request was malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller lacks the permission required for the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A named resource (model, record) was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation was attempted in a state that does not allow it, such as
    /// deleting an instance that was never saved.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    // ── ORM errors ───────────────────────────────────────────────────

    /// A query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// A query expected exactly one result but found several.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A statement failed in the database driver.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A UNIQUE, NOT NULL, or FOREIGN KEY constraint was violated.
    #[error("Integrity error: {0}")]
    IntegrityError(String),

    /// The database could not be opened or configured, or was busy or
    /// locked by another connection.
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more values failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A model or field declaration is inconsistent.
    #[error("Improperly configured: {0}")]
    ImproperlyConfigured(String),

    // ── Serialization / IO ───────────────────────────────────────────

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// An unexpected internal failure (hashing, task join).
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl StrataError {
    /// Returns the HTTP status code a transport layer should report.
    ///
    /// - `BadRequest`, `ValidationError`, `InvalidOperation` -> 400
    /// - `PermissionDenied` -> 403
    /// - `NotFound`, `DoesNotExist` -> 404
    /// - `IntegrityError` -> 409
    /// - everything else -> 500
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::ValidationError(_) | Self::InvalidOperation(_) => 400,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) | Self::DoesNotExist(_) => 404,
            Self::IntegrityError(_) => 409,
            Self::MultipleObjectsReturned(_)
            | Self::DatabaseError(_)
            | Self::OperationalError(_)
            | Self::ConfigurationError(_)
            | Self::ImproperlyConfigured(_)
            | Self::SerializationError(_)
            | Self::IoError(_)
            | Self::InternalServerError(_) => 500,
        }
    }
}

impl From<ValidationError> for StrataError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

impl From<serde_json::Error> for StrataError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// A convenience alias for `Result<T, StrataError>`.
pub type StrataResult<T> = Result<T, StrataError>;
