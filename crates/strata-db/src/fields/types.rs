//! Field descriptors and their column DDL.
//!
//! A [`FieldDef`] describes one declared attribute of a model: its
//! [`FieldType`], its constraints, and its default. Rendering a field to DDL
//! is pure; resolving which table a foreign key points at is the schema
//! builder's job (see [`crate::schema`]).

use std::fmt;

use crate::naming::{default_table_name, quote_ident};
use crate::value::Value;

/// Referential action for `ON DELETE` / `ON UPDATE` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    /// Delete or update dependent rows along with the parent.
    #[default]
    Cascade,
    /// Refuse to change the parent while dependents exist.
    Restrict,
    /// Set the referencing column to NULL.
    SetNull,
    /// Set the referencing column to its default.
    SetDefault,
    /// Defer the check to the end of the statement.
    NoAction,
}

impl ReferentialAction {
    /// Returns the SQL keyword(s) for this action.
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// The kind of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Bounded text; requires `max_length`.
    Char,
    /// Unbounded text.
    Text,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean stored as 0/1.
    Boolean,
    /// UTC timestamp stored as RFC 3339 text.
    DateTime,
    /// Calendar date stored as ISO text.
    Date,
    /// Bounded text holding an email address.
    Email,
    /// Auto-incrementing integer primary key.
    Auto,
    /// Integer column referencing another model's `id`.
    ForeignKey {
        /// Target model name, resolved at schema-build time.
        to: String,
        /// Action when the referenced row is deleted.
        on_delete: ReferentialAction,
        /// Action when the referenced key changes.
        on_update: ReferentialAction,
    },
    /// Association through a junction table; contributes no column.
    ManyToMany {
        /// Target model name.
        to: String,
    },
}

impl FieldType {
    /// Returns the short kind name exposed in field metadata.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::DateTime => "datetime",
            Self::Date => "date",
            Self::Email => "email",
            Self::Auto => "auto",
            Self::ForeignKey { .. } => "foreign_key",
            Self::ManyToMany { .. } => "many_to_many",
        }
    }

    /// Returns the related model name for relational kinds.
    pub fn related_model(&self) -> Option<&str> {
        match self {
            Self::ForeignKey { to, .. } | Self::ManyToMany { to } => Some(to),
            _ => None,
        }
    }

    /// Returns `true` for kinds that hold text.
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Char | Self::Text | Self::Email)
    }
}

/// A field default: a literal or a producer invoked at save time.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    /// A fixed value, also rendered into the column's `DEFAULT` clause.
    Literal(Value),
    /// A function called each time a save needs the default. Never rendered
    /// into DDL.
    Callable(fn() -> Value),
}

impl FieldDefault {
    /// Produces the default value, invoking the producer if there is one.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Callable(f) => f(),
        }
    }

    /// Returns the literal value, or `None` for callables.
    pub const fn literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            Self::Callable(_) => None,
        }
    }
}

/// A callable default producing the current UTC time.
pub fn now() -> Value {
    Value::DateTime(chrono::Utc::now())
}

/// The descriptor of one model field.
///
/// # Examples
///
/// ```
/// use strata_db::fields::{FieldDef, FieldType};
///
/// let title = FieldDef::char("title", 200).unique();
/// assert_eq!(
///     title.definition_sql(None).unwrap(),
///     "\"title\" VARCHAR(200) UNIQUE NOT NULL"
/// );
///
/// let published = FieldDef::boolean("is_published").default(false);
/// assert_eq!(published.constraints_sql(), "NOT NULL DEFAULT 0");
/// ```
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The field (and column) name.
    pub name: &'static str,
    /// The field kind.
    pub field_type: FieldType,
    /// Whether this is the primary key.
    pub primary_key: bool,
    /// Whether the key auto-increments.
    pub auto_increment: bool,
    /// Whether values must be unique.
    pub unique: bool,
    /// Whether NULL is allowed.
    pub null: bool,
    /// The default, if any.
    pub default: Option<FieldDefault>,
    /// Maximum text length (Char/Email).
    pub max_length: Option<u32>,
    /// Minimum text length.
    pub min_length: Option<u32>,
    /// Persisted but never serialized by `Model::to_json` or the admin.
    pub hidden: bool,
}

impl FieldDef {
    /// Creates a field of the given kind with no constraints.
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            primary_key: false,
            auto_increment: false,
            unique: false,
            null: false,
            default: None,
            max_length: None,
            min_length: None,
            hidden: false,
        }
    }

    /// The implicit `id INTEGER PRIMARY KEY AUTOINCREMENT` field.
    pub const fn auto_id() -> Self {
        Self::new("id", FieldType::Auto)
            .primary_key()
            .auto_increment()
    }

    /// A bounded text field.
    pub const fn char(name: &'static str, max_length: u32) -> Self {
        Self::new(name, FieldType::Char).max_length(max_length)
    }

    /// An unbounded text field.
    pub const fn text(name: &'static str) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// An integer field.
    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// A float field.
    pub const fn float(name: &'static str) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// A boolean field.
    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// A timestamp field.
    pub const fn datetime(name: &'static str) -> Self {
        Self::new(name, FieldType::DateTime)
    }

    /// A date field.
    pub const fn date(name: &'static str) -> Self {
        Self::new(name, FieldType::Date)
    }

    /// An email field with the conventional 254-character bound.
    pub const fn email(name: &'static str) -> Self {
        Self::new(name, FieldType::Email).max_length(254)
    }

    /// A foreign key to `to` with CASCADE on delete and update.
    pub fn foreign_key(name: &'static str, to: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldType::ForeignKey {
                to: to.into(),
                on_delete: ReferentialAction::Cascade,
                on_update: ReferentialAction::Cascade,
            },
        )
    }

    /// A many-to-many association with `to`.
    pub fn many_to_many(name: &'static str, to: impl Into<String>) -> Self {
        Self::new(name, FieldType::ManyToMany { to: to.into() })
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the key as auto-incrementing.
    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Adds a uniqueness constraint.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Allows NULL.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Sets the maximum text length.
    #[must_use]
    pub const fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Sets the minimum text length.
    #[must_use]
    pub const fn min_length(mut self, min_length: u32) -> Self {
        self.min_length = Some(min_length);
        self
    }

    /// Hides the field from serialization.
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Literal(value.into()));
        self
    }

    /// Sets a default producer, invoked on every save that needs it.
    #[must_use]
    pub fn default_fn(mut self, producer: fn() -> Value) -> Self {
        self.default = Some(FieldDefault::Callable(producer));
        self
    }

    /// Sets the `ON DELETE` action. No effect on non-foreign-key fields.
    #[must_use]
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        if let FieldType::ForeignKey { on_delete, .. } = &mut self.field_type {
            *on_delete = action;
        }
        self
    }

    /// Sets the `ON UPDATE` action. No effect on non-foreign-key fields.
    #[must_use]
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        if let FieldType::ForeignKey { on_update, .. } = &mut self.field_type {
            *on_update = action;
        }
        self
    }

    /// Returns `true` if the field is backed by a column on the owning table.
    pub const fn has_column(&self) -> bool {
        !matches!(self.field_type, FieldType::ManyToMany { .. })
    }

    /// Returns `true` for the `id` primary key.
    pub fn is_id(&self) -> bool {
        self.primary_key && self.name == "id"
    }

    /// Returns the SQLite storage type, or `None` for many-to-many fields.
    pub fn column_type(&self) -> Option<String> {
        let ty = match &self.field_type {
            FieldType::Char => format!("VARCHAR({})", self.max_length.unwrap_or(255)),
            FieldType::Email => format!("VARCHAR({})", self.max_length.unwrap_or(254)),
            FieldType::Text | FieldType::DateTime | FieldType::Date => "TEXT".to_string(),
            FieldType::Integer
            | FieldType::Boolean
            | FieldType::Auto
            | FieldType::ForeignKey { .. } => "INTEGER".to_string(),
            FieldType::Float => "REAL".to_string(),
            FieldType::ManyToMany { .. } => return None,
        };
        Some(ty)
    }

    /// Renders the constraint keywords for this field.
    ///
    /// Order: `PRIMARY KEY`, `AUTOINCREMENT`, `UNIQUE`, `NOT NULL` (omitted for
    /// nullable and primary-key fields), then a literal `DEFAULT`. Callable
    /// defaults never appear here.
    pub fn constraints_sql(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if self.auto_increment {
            parts.push("AUTOINCREMENT".to_string());
        }
        if self.unique {
            parts.push("UNIQUE".to_string());
        }
        if !self.null && !self.primary_key {
            parts.push("NOT NULL".to_string());
        }
        if let Some(value) = self.default.as_ref().and_then(FieldDefault::literal) {
            parts.push(format!("DEFAULT {}", value.sql_literal()));
        }
        parts.join(" ")
    }

    /// Renders the `REFERENCES` clause for a foreign key pointing at
    /// `table`, or `None` for other kinds.
    pub fn references_sql(&self, table: &str) -> Option<String> {
        match &self.field_type {
            FieldType::ForeignKey {
                on_delete,
                on_update,
                ..
            } => Some(format!(
                "REFERENCES {}(\"id\") ON DELETE {on_delete} ON UPDATE {on_update}",
                quote_ident(table)
            )),
            _ => None,
        }
    }

    /// Renders the full column definition.
    ///
    /// For foreign keys, `related_table` names the referenced table; when it
    /// is `None` the conventional table name of the target model is used.
    /// Returns `None` for many-to-many fields.
    pub fn definition_sql(&self, related_table: Option<&str>) -> Option<String> {
        let mut sql = format!("{} {}", quote_ident(self.name), self.column_type()?);
        let constraints = self.constraints_sql();
        if !constraints.is_empty() {
            sql.push(' ');
            sql.push_str(&constraints);
        }
        if let FieldType::ForeignKey { to, .. } = &self.field_type {
            let table = related_table.map_or_else(|| default_table_name(to), str::to_string);
            if let Some(clause) = self.references_sql(&table) {
                sql.push(' ');
                sql.push_str(&clause);
            }
        }
        Some(sql)
    }
}
