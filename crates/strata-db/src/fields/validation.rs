//! Declaration checks and value conversion for fields.
//!
//! [`FieldDef::validate`] rejects inconsistent declarations when a model is
//! registered. The value-level helpers convert and check input coming from
//! outside the type system (JSON bodies, query strings, raw rows).

use once_cell::sync::Lazy;
use regex::Regex;
use strata_core::{StrataError, StrataResult, ValidationError};

use super::types::{FieldDef, FieldType};
use crate::value::{parse_date, parse_datetime, Value};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});

impl FieldDef {
    /// Checks the declaration for inconsistent options.
    pub fn validate(&self) -> StrataResult<()> {
        let fail = |msg: &str| {
            Err(StrataError::ImproperlyConfigured(format!(
                "Field '{}': {msg}",
                self.name
            )))
        };

        if self.max_length == Some(0) {
            return fail("max_length must be greater than 0");
        }
        if matches!(self.field_type, FieldType::Char) && self.max_length.is_none() {
            return fail("Char fields require max_length");
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return fail("min_length exceeds max_length");
            }
        }
        if self.primary_key && self.null {
            return fail("a primary key cannot be nullable");
        }
        if self.primary_key && self.name != "id" {
            return fail("only the implicit 'id' field may be the primary key");
        }
        if self.auto_increment && !matches!(self.field_type, FieldType::Auto) {
            return fail("auto_increment is only valid on Auto fields");
        }
        if let FieldType::ManyToMany { .. } = self.field_type {
            if self.default.is_some() || self.unique {
                return fail("many-to-many fields take no default or unique constraint");
            }
        }
        if let Some(value) = self.default.as_ref().and_then(|d| d.literal()) {
            if let Err(err) = self.validate_value(value) {
                return fail(&format!("invalid default: {err}"));
            }
        }
        Ok(())
    }

    /// Checks that `value` fits this field.
    ///
    /// NULL is accepted when the field is nullable or has a default (the
    /// default is applied at save time).
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.null || self.default.is_some() || self.primary_key {
                return Ok(());
            }
            return Err(ValidationError::new("This field cannot be null.", "null"));
        }

        let type_ok = match (&self.field_type, value) {
            (FieldType::Char | FieldType::Text | FieldType::Email, Value::String(_))
            | (FieldType::Float, Value::Float(_) | Value::Int(_))
            | (FieldType::Boolean, Value::Bool(_))
            | (FieldType::DateTime, Value::DateTime(_))
            | (FieldType::Date, Value::Date(_))
            | (
                FieldType::Integer | FieldType::Auto | FieldType::ForeignKey { .. },
                Value::Int(_),
            ) => true,
            _ => false,
        };
        if !type_ok {
            return Err(ValidationError::new(
                format!("Expected a {} value.", self.field_type.kind()),
                "invalid",
            ));
        }

        if let Value::String(s) = value {
            let len = s.chars().count();
            if let Some(max) = self.max_length {
                if len > max as usize {
                    return Err(ValidationError::new(
                        format!("Ensure this value has at most {max} characters (it has {len})."),
                        "max_length",
                    )
                    .with_param("max_length", max.to_string()));
                }
            }
            if let Some(min) = self.min_length {
                if len < min as usize {
                    return Err(ValidationError::new(
                        format!("Ensure this value has at least {min} characters (it has {len})."),
                        "min_length",
                    )
                    .with_param("min_length", min.to_string()));
                }
            }
            if matches!(self.field_type, FieldType::Email) && !EMAIL_RE.is_match(s) {
                return Err(ValidationError::new(
                    "Enter a valid email address.",
                    "invalid",
                ));
            }
        }
        Ok(())
    }

    /// Converts a JSON input value to a typed [`Value`] for this field.
    pub fn value_from_json(&self, json: &serde_json::Value) -> Result<Value, ValidationError> {
        use serde_json::Value as Json;

        let invalid = || {
            ValidationError::new(
                format!("Expected a {} value.", self.field_type.kind()),
                "invalid",
            )
        };

        match (&self.field_type, json) {
            (_, Json::Null) => Ok(Value::Null),
            (FieldType::Char | FieldType::Text | FieldType::Email, Json::String(s)) => {
                Ok(Value::String(s.clone()))
            }
            (FieldType::Integer | FieldType::Auto | FieldType::ForeignKey { .. }, Json::Number(n)) => {
                n.as_i64().map(Value::Int).ok_or_else(invalid)
            }
            (FieldType::Float, Json::Number(n)) => n.as_f64().map(Value::Float).ok_or_else(invalid),
            (FieldType::Boolean, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (FieldType::Boolean, Json::Number(n)) => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(invalid()),
            },
            (FieldType::DateTime | FieldType::Date, Json::String(s)) => self.value_from_str(s),
            _ => Err(invalid()),
        }
    }

    /// Renders a stored or typed value as JSON for this field, widening it
    /// first so booleans and timestamps come out in their natural form.
    pub fn value_to_json(&self, value: &Value) -> serde_json::Value {
        self.from_storage(value.clone()).to_json()
    }

    /// Parses text input (e.g. a query-string filter) into a typed value.
    pub fn value_from_str(&self, text: &str) -> Result<Value, ValidationError> {
        let invalid = || {
            ValidationError::new(
                format!("'{text}' is not a valid {} value.", self.field_type.kind()),
                "invalid",
            )
        };

        match &self.field_type {
            FieldType::Char | FieldType::Text | FieldType::Email => Ok(Value::String(text.to_string())),
            FieldType::Integer | FieldType::Auto | FieldType::ForeignKey { .. } => {
                text.trim().parse::<i64>().map(Value::Int).map_err(|_| invalid())
            }
            FieldType::Float => text.trim().parse::<f64>().map(Value::Float).map_err(|_| invalid()),
            FieldType::Boolean => match text.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            FieldType::DateTime => parse_datetime(text).map(Value::DateTime).ok_or_else(invalid),
            FieldType::Date => parse_date(text).map(Value::Date).ok_or_else(invalid),
            FieldType::ManyToMany { .. } => Err(invalid()),
        }
    }

    /// Narrows a value for storage (booleans to 0/1, dates to text).
    pub fn to_storage(&self, value: &Value) -> Value {
        value.to_storage()
    }

    /// Widens a stored value back to this field's type.
    ///
    /// Integers in boolean columns become booleans; text in date and
    /// timestamp columns is parsed. Values that do not parse are returned
    /// unchanged.
    pub fn from_storage(&self, value: Value) -> Value {
        match (&self.field_type, value) {
            (FieldType::Boolean, Value::Int(i)) => Value::Bool(i != 0),
            (FieldType::Float, Value::Int(i)) => {
                #[allow(clippy::cast_precision_loss)]
                let f = i as f64;
                Value::Float(f)
            }
            (FieldType::DateTime, Value::String(s)) => {
                parse_datetime(&s).map_or(Value::String(s), Value::DateTime)
            }
            (FieldType::Date, Value::String(s)) => parse_date(&s).map_or(Value::String(s), Value::Date),
            (_, other) => other,
        }
    }
}
