//! The model registry.
//!
//! A [`ModelRegistry`] maps model names to [`ModelMetadata`]: the model's
//! [`ModelMeta`], display options, and allowed permission verbs. It is an
//! explicit value created at bootstrap and shared through `Arc`; the schema
//! builder resolves foreign-key targets through it and the admin service
//! reads its options.
//!
//! ```
//! use strata_db::registry::{ModelRegistry, RegisterOptions};
//! # use std::sync::LazyLock;
//! # use strata_db::{fields::FieldDef, model::{Model, ModelMeta}, query::Row, value::Value};
//! # struct Tag { id: Option<i64> }
//! # impl Model for Tag {
//! #     fn meta() -> &'static ModelMeta {
//! #         static M: LazyLock<ModelMeta> = LazyLock::new(|| ModelMeta::new("Tag", None, vec![]));
//! #         &M
//! #     }
//! #     fn id(&self) -> Option<i64> { self.id }
//! #     fn set_id(&mut self, id: Option<i64>) { self.id = id; }
//! #     fn field_values(&self) -> Vec<(&'static str, Value)> { vec![] }
//! #     fn from_row(row: &Row) -> strata_core::StrataResult<Self> { Ok(Tag { id: row.get("id")? }) }
//! # }
//!
//! let registry = ModelRegistry::new();
//! registry.register::<Tag>(RegisterOptions::new().icon("tag")).unwrap();
//! assert_eq!(registry.table_for("Tag").as_deref(), Some("tags"));
//! assert!(registry.get("Missing").is_none());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use strata_core::{StrataError, StrataResult};

use crate::fields::{FieldDef, FieldDefault, FieldType, ReferentialAction};
use crate::model::{Model, ModelMeta};

/// A permission verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    /// Read rows.
    View,
    /// Create rows.
    Add,
    /// Update rows.
    Change,
    /// Delete rows.
    Delete,
}

impl PermissionAction {
    /// All four verbs, in canonical order.
    pub const ALL: [Self; 4] = [Self::View, Self::Add, Self::Change, Self::Delete];

    /// Returns the lower-case verb.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Add => "add",
            Self::Change => "change",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for PermissionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionAction {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "add" => Ok(Self::Add),
            "change" => Ok(Self::Change),
            "delete" => Ok(Self::Delete),
            other => Err(StrataError::BadRequest(format!(
                "Unknown permission action '{other}'"
            ))),
        }
    }
}

/// Options supplied when registering a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterOptions {
    /// App grouping; defaults to `"default"`.
    pub app: Option<String>,
    /// Human-readable name; defaults to the model name.
    pub display_name: Option<String>,
    /// Icon token for admin front-ends.
    pub icon: Option<String>,
    /// Allowed verbs; `None` allows all four.
    pub permissions: Option<Vec<PermissionAction>>,
    /// Fields never shown or accepted by the admin.
    pub exclude: Vec<String>,
    /// Fields matched by admin search.
    pub search_fields: Vec<String>,
    /// Fields the admin list may filter on.
    pub filter_fields: Vec<String>,
    /// Columns shown in admin lists; empty means all visible columns.
    pub list_display: Vec<String>,
}

impl RegisterOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the app grouping.
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    /// Sets the display name.
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the icon token.
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Restricts the allowed verbs.
    pub fn permissions(mut self, actions: &[PermissionAction]) -> Self {
        self.permissions = Some(actions.to_vec());
        self
    }

    /// Excludes fields from admin input and output.
    pub fn exclude(mut self, fields: &[&str]) -> Self {
        self.exclude = fields.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the searchable fields.
    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the filterable fields.
    pub fn filter_fields(mut self, fields: &[&str]) -> Self {
        self.filter_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the list display columns.
    pub fn list_display(mut self, fields: &[&str]) -> Self {
        self.list_display = fields.iter().map(ToString::to_string).collect();
        self
    }
}

/// Serializable description of one field, derived from its [`FieldDef`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetadata {
    /// Field name.
    pub name: String,
    /// Kind name (`"char"`, `"foreign_key"`, ...).
    pub kind: &'static str,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Maximum text length.
    pub max_length: Option<u32>,
    /// Minimum text length.
    pub min_length: Option<u32>,
    /// Whether the field has a default.
    pub has_default: bool,
    /// The literal default, when there is one.
    pub default: Option<serde_json::Value>,
    /// Whether serialization omits the field.
    pub hidden: bool,
    /// Whether clients may write the field.
    pub editable: bool,
    /// Target model for relational kinds.
    pub related_model: Option<String>,
    /// `ON DELETE` action for foreign keys.
    pub on_delete: Option<ReferentialAction>,
    /// `ON UPDATE` action for foreign keys.
    pub on_update: Option<ReferentialAction>,
}

impl From<&FieldDef> for FieldMetadata {
    fn from(field: &FieldDef) -> Self {
        let (on_delete, on_update) = match &field.field_type {
            FieldType::ForeignKey {
                on_delete,
                on_update,
                ..
            } => (Some(*on_delete), Some(*on_update)),
            _ => (None, None),
        };
        Self {
            name: field.name.to_string(),
            kind: field.field_type.kind(),
            primary_key: field.primary_key,
            unique: field.unique,
            nullable: field.null,
            max_length: field.max_length,
            min_length: field.min_length,
            has_default: field.default.is_some(),
            default: field
                .default
                .as_ref()
                .and_then(FieldDefault::literal)
                .map(crate::value::Value::to_json),
            hidden: field.hidden,
            editable: !field.is_id() && field.has_column(),
            related_model: field.field_type.related_model().map(str::to_string),
            on_delete,
            on_update,
        }
    }
}

/// One registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    /// The model's static metadata.
    #[serde(skip)]
    pub meta: &'static ModelMeta,
    /// Model name.
    pub name: String,
    /// Table name.
    pub table: String,
    /// App grouping.
    pub app: String,
    /// Human-readable name.
    pub display_name: String,
    /// Icon token.
    pub icon: Option<String>,
    /// Allowed permission verbs.
    pub permissions: Vec<PermissionAction>,
    /// Field descriptions in declaration order.
    pub fields: Vec<FieldMetadata>,
    /// The options supplied at registration.
    pub options: RegisterOptions,
}

impl ModelMetadata {
    /// Builds an entry from static metadata and options.
    pub fn new(meta: &'static ModelMeta, options: RegisterOptions) -> Self {
        Self {
            meta,
            name: meta.name.to_string(),
            table: meta.table.clone(),
            app: options.app.clone().unwrap_or_else(|| "default".to_string()),
            display_name: options
                .display_name
                .clone()
                .unwrap_or_else(|| meta.name.to_string()),
            icon: options.icon.clone(),
            permissions: options
                .permissions
                .clone()
                .unwrap_or_else(|| PermissionAction::ALL.to_vec()),
            fields: meta.fields.iter().map(FieldMetadata::from).collect(),
            options,
        }
    }

    /// Returns `true` if `action` is among the allowed verbs.
    pub fn allows(&self, action: PermissionAction) -> bool {
        self.permissions.contains(&action)
    }

    /// Returns `true` if the admin should never show or accept `field`.
    pub fn is_excluded(&self, field: &str) -> bool {
        self.options.exclude.iter().any(|f| f == field)
    }
}

/// Registry of models keyed by name.
///
/// Registration keeps insertion order; registering a name again replaces
/// the entry in place.
#[derive(Default)]
pub struct ModelRegistry {
    entries: RwLock<Vec<Arc<ModelMetadata>>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers model `M`.
    pub fn register<M: Model>(&self, options: RegisterOptions) -> StrataResult<Arc<ModelMetadata>> {
        self.register_meta(M::meta(), options)
    }

    /// Registers a model by its static metadata.
    pub fn register_meta(
        &self,
        meta: &'static ModelMeta,
        options: RegisterOptions,
    ) -> StrataResult<Arc<ModelMetadata>> {
        meta.validate()?;
        for name in options
            .exclude
            .iter()
            .chain(&options.search_fields)
            .chain(&options.filter_fields)
            .chain(&options.list_display)
        {
            if !meta.has_column(name) {
                return Err(StrataError::ImproperlyConfigured(format!(
                    "Model '{}' has no column '{name}' named in its registration options",
                    meta.name
                )));
            }
        }

        let entry = Arc::new(ModelMetadata::new(meta, options));
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = entries.iter_mut().find(|e| e.name == entry.name) {
            *slot = Arc::clone(&entry);
        } else {
            entries.push(Arc::clone(&entry));
        }
        tracing::debug!(model = %entry.name, table = %entry.table, "Registered model");
        Ok(entry)
    }

    /// Looks up a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<ModelMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.name == name)
            .cloned()
    }

    /// Looks up a model by name, failing with `NotFound`.
    pub fn require(&self, name: &str) -> StrataResult<Arc<ModelMetadata>> {
        self.get(name)
            .ok_or_else(|| StrataError::NotFound(format!("Model '{name}' is not registered")))
    }

    /// All entries in registration order.
    pub fn list(&self) -> Vec<Arc<ModelMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All model names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.name.clone())
            .collect()
    }

    /// The table of a registered model.
    pub fn table_for(&self, name: &str) -> Option<String> {
        self.get(name).map(|e| e.table.clone())
    }

    /// Removes a model; returns whether it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}
