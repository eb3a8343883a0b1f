//! `CREATE TABLE` / `DROP TABLE` generation.
//!
//! Foreign-key and many-to-many targets are model names; they are resolved
//! to table names through the [`ModelRegistry`] here. A model may reference
//! itself without being registered.

use strata_core::{StrataError, StrataResult};

use crate::fields::{FieldDef, FieldType};
use crate::model::ModelMeta;
use crate::naming::{junction_table_name, quote_ident};
use crate::registry::ModelRegistry;

/// The junction table behind a many-to-many field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JunctionTable {
    /// Junction table name, e.g. `post_tags`.
    pub table: String,
    /// Column referencing the owner, e.g. `post_id`.
    pub owner_column: String,
    /// Column referencing the target, e.g. `tag_id`.
    pub target_column: String,
    /// The owner's table.
    pub owner_table: String,
    /// The target's table.
    pub target_table: String,
}

impl JunctionTable {
    /// Derives the junction table for `field` on `owner`.
    ///
    /// Self-relations prefix the columns with `from_` and `to_`.
    pub fn new(owner: &ModelMeta, target_name: &str, target_table: &str) -> Self {
        let owner_lower = owner.name.to_lowercase();
        let target_lower = target_name.to_lowercase();
        let (owner_column, target_column) = if owner_lower == target_lower {
            (format!("from_{owner_lower}_id"), format!("to_{target_lower}_id"))
        } else {
            (format!("{owner_lower}_id"), format!("{target_lower}_id"))
        };
        Self {
            table: junction_table_name(owner.name, target_name),
            owner_column,
            target_column,
            owner_table: owner.table.clone(),
            target_table: target_table.to_string(),
        }
    }

    /// A junction whose table and columns are named explicitly, such as one
    /// declared as its own model.
    pub fn with_columns(
        table: impl Into<String>,
        owner_table: impl Into<String>,
        owner_column: impl Into<String>,
        target_table: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
            owner_table: owner_table.into(),
            target_table: target_table.into(),
        }
    }

    /// Resolves the junction table for the many-to-many field `field_name`.
    pub fn resolve(
        registry: &ModelRegistry,
        owner: &ModelMeta,
        field_name: &str,
    ) -> StrataResult<Self> {
        let field = owner.field(field_name).ok_or_else(|| {
            StrataError::ImproperlyConfigured(format!(
                "Model '{}' has no field '{field_name}'",
                owner.name
            ))
        })?;
        let FieldType::ManyToMany { to } = &field.field_type else {
            return Err(StrataError::ImproperlyConfigured(format!(
                "Field '{}.{field_name}' is not a many-to-many field",
                owner.name
            )));
        };
        let target_table = resolve_target(registry, owner, field, to)?;
        Ok(Self::new(owner, to, &target_table))
    }

    /// The junction's `CREATE TABLE` statement.
    pub fn create_sql(&self) -> String {
        let owner = quote_ident(&self.owner_column);
        let target = quote_ident(&self.target_column);
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             {owner} INTEGER NOT NULL REFERENCES {}(\"id\") ON DELETE CASCADE, \
             {target} INTEGER NOT NULL REFERENCES {}(\"id\") ON DELETE CASCADE, \
             UNIQUE ({owner}, {target}))",
            quote_ident(&self.table),
            quote_ident(&self.owner_table),
            quote_ident(&self.target_table),
        )
    }

    /// The junction's `DROP TABLE` statement.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(&self.table))
    }
}

fn resolve_target(
    registry: &ModelRegistry,
    owner: &ModelMeta,
    field: &FieldDef,
    target: &str,
) -> StrataResult<String> {
    if target == owner.name {
        return Ok(owner.table.clone());
    }
    registry.table_for(target).ok_or_else(|| {
        StrataError::ImproperlyConfigured(format!(
            "Field '{}.{}' references unregistered model '{target}'",
            owner.name, field.name
        ))
    })
}

/// Builds the statements creating `meta`'s table followed by its junction
/// tables.
///
/// ```
/// use strata_db::fields::FieldDef;
/// use strata_db::model::ModelMeta;
/// use strata_db::registry::ModelRegistry;
/// use strata_db::schema::create_table_sql;
///
/// let meta = ModelMeta::new("Note", None, vec![FieldDef::text("body")]);
/// let sql = create_table_sql(&meta, &ModelRegistry::new()).unwrap();
/// assert_eq!(
///     sql,
///     vec!["CREATE TABLE IF NOT EXISTS \"notes\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"body\" TEXT NOT NULL)"]
/// );
/// ```
pub fn create_table_sql(meta: &ModelMeta, registry: &ModelRegistry) -> StrataResult<Vec<String>> {
    let mut columns = Vec::new();
    let mut junctions = Vec::new();

    for field in &meta.fields {
        match &field.field_type {
            FieldType::ForeignKey { to, .. } => {
                let table = resolve_target(registry, meta, field, to)?;
                columns.extend(field.definition_sql(Some(&table)));
            }
            FieldType::ManyToMany { to } => {
                let table = resolve_target(registry, meta, field, to)?;
                junctions.push(JunctionTable::new(meta, to, &table).create_sql());
            }
            _ => columns.extend(field.definition_sql(None)),
        }
    }

    let mut statements = vec![format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(&meta.table),
        columns.join(", ")
    )];
    statements.extend(junctions);
    Ok(statements)
}

/// Builds the statements dropping `meta`'s junction tables and then its
/// table. Junction names follow from model names alone, so no registry is
/// needed.
pub fn drop_table_sql(meta: &ModelMeta) -> Vec<String> {
    let mut statements: Vec<String> = meta
        .many_to_many_fields()
        .filter_map(|f| f.field_type.related_model())
        .map(|to| format!("DROP TABLE IF EXISTS {}", quote_ident(&junction_table_name(meta.name, to))))
        .collect();
    statements.push(format!("DROP TABLE IF EXISTS {}", quote_ident(&meta.table)));
    statements
}
