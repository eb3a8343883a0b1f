//! Model trait and metadata for the ORM.
//!
//! The [`Model`] trait is implemented by every persistent record type, in
//! practice through `#[derive(Model)]`. [`ModelMeta`] holds the declared
//! fields and the table name; the implicit `id` key is always its first
//! field.

use std::collections::HashSet;

use strata_core::{StrataError, StrataResult};

use crate::fields::FieldDef;
use crate::naming::default_table_name;
use crate::query::{Manager, Row};
use crate::value::Value;

/// Static metadata describing a model type.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// The model name, e.g. `"Post"`.
    pub name: &'static str,
    /// The table name, e.g. `"posts"`.
    pub table: String,
    /// All fields, starting with the implicit `id`.
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    /// Builds metadata for `name`, injecting the `id` primary key ahead of
    /// `fields`. Without an explicit `table` the conventional plural is used.
    ///
    /// ```
    /// use strata_db::fields::FieldDef;
    /// use strata_db::model::ModelMeta;
    ///
    /// let meta = ModelMeta::new("Category", None, vec![FieldDef::char("name", 50)]);
    /// assert_eq!(meta.table, "categories");
    /// assert_eq!(meta.fields[0].name, "id");
    /// ```
    pub fn new(name: &'static str, table: Option<&str>, fields: Vec<FieldDef>) -> Self {
        let mut all = Vec::with_capacity(fields.len() + 1);
        all.push(FieldDef::auto_id());
        all.extend(fields.into_iter().filter(|f| f.name != "id"));
        Self {
            name,
            table: table.map_or_else(|| default_table_name(name), str::to_string),
            fields: all,
        }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields backed by a column, `id` included.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.has_column())
    }

    /// Column-backed fields other than `id`; the ones a save writes.
    pub fn data_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.has_column() && !f.is_id())
    }

    /// Many-to-many fields.
    pub fn many_to_many_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.has_column())
    }

    /// Returns `true` if `name` is a column of this model's table.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns().any(|f| f.name == name)
    }

    /// Checks every field declaration and rejects duplicate names.
    pub fn validate(&self) -> StrataResult<()> {
        if self.name.is_empty() {
            return Err(StrataError::ImproperlyConfigured(
                "Model name cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name) {
                return Err(StrataError::ImproperlyConfigured(format!(
                    "Model '{}' declares field '{}' more than once",
                    self.name, field.name
                )));
            }
            field.validate().map_err(|e| match e {
                StrataError::ImproperlyConfigured(msg) => {
                    StrataError::ImproperlyConfigured(format!("{}: {msg}", self.name))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Converts a raw row into JSON using this model's field types.
    ///
    /// Includes `id` and every non-hidden column; values are rendered with
    /// [`FieldDef::value_to_json`] so booleans come back as booleans.
    pub fn row_to_json(&self, row: &Row) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        for field in self.columns().filter(|f| !f.hidden) {
            let value = row.get_value(field.name).cloned().unwrap_or(Value::Null);
            map.insert(field.name.to_string(), field.value_to_json(&value));
        }
        map
    }
}

/// Marker type for a many-to-many field on a derived model.
///
/// The field holds no data; associations live in the junction table and are
/// reached through [`Related`](crate::related::Related).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ManyToMany;

/// The core trait for all ORM models.
///
/// Derive it with `#[derive(Model)]`, or implement it by hand:
///
/// ```
/// use std::sync::LazyLock;
/// use strata_db::fields::FieldDef;
/// use strata_db::model::{Model, ModelMeta};
/// use strata_db::query::Row;
/// use strata_db::value::Value;
/// use strata_core::StrataResult;
///
/// struct Tag {
///     id: Option<i64>,
///     label: String,
/// }
///
/// impl Model for Tag {
///     fn meta() -> &'static ModelMeta {
///         static META: LazyLock<ModelMeta> =
///             LazyLock::new(|| ModelMeta::new("Tag", None, vec![FieldDef::char("label", 40)]));
///         &META
///     }
///     fn id(&self) -> Option<i64> { self.id }
///     fn set_id(&mut self, id: Option<i64>) { self.id = id; }
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("label", Value::from(self.label.clone()))]
///     }
///     fn from_row(row: &Row) -> StrataResult<Self> {
///         Ok(Tag { id: row.get("id")?, label: row.get("label")? })
///     }
/// }
///
/// let tag = Tag { id: Some(3), label: "rust".into() };
/// assert_eq!(tag.to_json()["label"], "rust");
/// assert_eq!(Tag::meta().table, "tags");
/// ```
pub trait Model: Send + Sync + Sized + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the primary key, or `None` if the instance is unsaved.
    fn id(&self) -> Option<i64>;

    /// Sets the primary key (after INSERT, or `None` after DELETE).
    fn set_id(&mut self, id: Option<i64>);

    /// Returns the declared column values, excluding `id` and
    /// many-to-many fields, in declaration order.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Builds an instance from a database row.
    fn from_row(row: &Row) -> StrataResult<Self>;

    /// Returns the model name.
    fn model_name() -> &'static str {
        Self::meta().name
    }

    /// Returns the table name.
    fn table_name() -> &'static str {
        Self::meta().table.as_str()
    }

    /// Returns the manager for this model.
    fn objects() -> Manager<Self> {
        Manager::new()
    }

    /// Serializes the instance: `id` plus every non-hidden column.
    fn to_json(&self) -> serde_json::Value {
        let meta = Self::meta();
        let mut map = serde_json::Map::new();
        map.insert(
            "id".to_string(),
            self.id().map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        for (name, value) in self.field_values() {
            let visible = meta
                .field(name)
                .is_some_and(|f| f.has_column() && !f.hidden);
            if visible {
                map.insert(name.to_string(), value.to_json());
            }
        }
        serde_json::Value::Object(map)
    }
}
