//! Database executor trait and model persistence.
//!
//! [`DbExecutor`] is the minimal async interface the ORM needs from a
//! backend; `SqliteBackend` in `strata-db-backends` implements it. The free
//! functions here turn model instances (and, for registry-driven callers,
//! plain column maps) into statements, and [`ActiveRecord`] exposes them as
//! methods on every [`Model`].

use std::collections::HashMap;

use async_trait::async_trait;
use strata_core::{StrataError, StrataResult};

use crate::fields::FieldDef;
use crate::model::{Model, ModelMeta};
use crate::query::{Query, Row, SqlCompiler, Statement};
use crate::registry::ModelRegistry;
use crate::schema::{create_table_sql, drop_table_sql};
use crate::value::Value;

/// Minimal async database executor.
///
/// This trait lives in the ORM crate so that query execution can be defined
/// without depending on a concrete backend.
#[async_trait]
pub trait DbExecutor: Send + Sync {
    /// Runs a statement that returns no rows; returns the affected count.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> StrataResult<u64>;

    /// Runs a query and returns every row.
    async fn query(&self, sql: &str, params: &[Value]) -> StrataResult<Vec<Row>>;

    /// Runs a query expected to return exactly one row.
    async fn query_one(&self, sql: &str, params: &[Value]) -> StrataResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(StrataError::DoesNotExist("No row matches the query".to_string())),
            1 => Ok(rows.remove(0)),
            n => Err(StrataError::MultipleObjectsReturned(format!(
                "Query returned {n} rows, expected one"
            ))),
        }
    }

    /// Runs an INSERT and returns the generated row id.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StrataResult<i64>;

    /// Runs every statement inside one transaction; any failure rolls the
    /// whole batch back. Returns the total affected count.
    async fn execute_atomic(&self, statements: &[Statement]) -> StrataResult<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveMode {
    Insert,
    Update,
}

/// Decides what a save writes for one column.
///
/// `None` means the column is left out of the statement. A NULL (or absent,
/// on insert) value picks up the field default; a NULL without a default is
/// skipped on insert so the column's own DDL default applies, and written
/// as NULL on update.
fn resolve_column(field: &FieldDef, provided: Option<Value>, mode: SaveMode) -> Option<Value> {
    match provided {
        Some(value) if !value.is_null() => Some(value),
        Some(_) => match (&field.default, mode) {
            (Some(default), _) => Some(default.resolve()),
            (None, SaveMode::Insert) => None,
            (None, SaveMode::Update) => Some(Value::Null),
        },
        None => match mode {
            SaveMode::Insert => field.default.as_ref().map(crate::fields::FieldDefault::resolve),
            SaveMode::Update => None,
        },
    }
}

fn resolve_columns(
    meta: &ModelMeta,
    mut provided: HashMap<&str, Value>,
    mode: SaveMode,
) -> Vec<(&'static str, Value)> {
    meta.data_fields()
        .filter_map(|field| {
            resolve_column(field, provided.remove(field.name), mode).map(|v| (field.name, v))
        })
        .collect()
}

fn by_id(table: &str, id: i64) -> Query {
    let mut query = Query::new(table);
    query.add_filter("id", id);
    query
}

// ── Model operations ───────────────────────────────────────────────────

/// Saves a model instance: UPDATE when it has an id, INSERT otherwise.
pub async fn save_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> StrataResult<()> {
    let meta = M::meta();
    let values: HashMap<&str, Value> = model.field_values().into_iter().collect();

    if let Some(id) = model.id() {
        let columns = resolve_columns(meta, values, SaveMode::Update);
        if columns.is_empty() {
            return Ok(());
        }
        let (sql, params) = SqlCompiler::compile_update(&meta.table, &columns, id);
        db.execute_sql(&sql, &params).await?;
    } else {
        let columns = resolve_columns(meta, values, SaveMode::Insert);
        let (sql, params) = SqlCompiler::compile_insert(&meta.table, &columns);
        let id = db.insert_returning_id(&sql, &params).await?;
        model.set_id(Some(id));
    }
    Ok(())
}

/// Deletes a persisted instance, consuming it.
pub async fn delete_model<M: Model>(model: M, db: &dyn DbExecutor) -> StrataResult<()> {
    let id = model.id().ok_or_else(|| {
        StrataError::InvalidOperation(format!(
            "Cannot delete an unsaved {} instance",
            M::model_name()
        ))
    })?;
    delete_by_id(db, M::meta(), id).await?;
    Ok(())
}

/// Reloads a persisted instance from its row.
pub async fn refresh_model<M: Model>(model: &mut M, db: &dyn DbExecutor) -> StrataResult<()> {
    let id = model.id().ok_or_else(|| {
        StrataError::InvalidOperation(format!(
            "Cannot refresh an unsaved {} instance",
            M::model_name()
        ))
    })?;
    let row = fetch_by_id(db, M::meta(), id).await?.ok_or_else(|| {
        StrataError::DoesNotExist(format!("{} with id {id} does not exist", M::model_name()))
    })?;
    *model = M::from_row(&row)?;
    Ok(())
}

/// Creates the table (and junction tables) described by `meta`.
pub async fn create_table_for(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    registry: &ModelRegistry,
) -> StrataResult<()> {
    for sql in create_table_sql(meta, registry)? {
        db.execute_sql(&sql, &[]).await?;
    }
    tracing::info!(model = meta.name, table = %meta.table, "Created table");
    Ok(())
}

/// Drops the junction tables and then the table described by `meta`.
pub async fn drop_table_for(db: &dyn DbExecutor, meta: &ModelMeta) -> StrataResult<()> {
    for sql in drop_table_sql(meta) {
        db.execute_sql(&sql, &[]).await?;
    }
    Ok(())
}

/// Creates the tables of every registered model, in registration order.
pub async fn create_all_tables(db: &dyn DbExecutor, registry: &ModelRegistry) -> StrataResult<()> {
    for entry in registry.list() {
        create_table_for(db, entry.meta, registry).await?;
    }
    Ok(())
}

/// Drops the tables of every registered model, in reverse registration
/// order.
pub async fn drop_all_tables(db: &dyn DbExecutor, registry: &ModelRegistry) -> StrataResult<()> {
    for entry in registry.list().iter().rev() {
        drop_table_for(db, entry.meta).await?;
    }
    Ok(())
}

// ── Dynamic operations ─────────────────────────────────────────────────

/// Inserts a row from a column map, applying defaults. Unknown keys and
/// `id` are ignored. Returns the new id.
pub async fn insert_values(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    values: HashMap<String, Value>,
) -> StrataResult<i64> {
    let provided = values.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    let columns = resolve_columns(meta, provided, SaveMode::Insert);
    let (sql, params) = SqlCompiler::compile_insert(&meta.table, &columns);
    db.insert_returning_id(&sql, &params).await
}

/// Updates the given columns of row `id`. Columns not in `values` are left
/// untouched. Returns the affected count.
pub async fn update_values(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    id: i64,
    values: HashMap<String, Value>,
) -> StrataResult<u64> {
    let provided = values.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    let columns = resolve_columns(meta, provided, SaveMode::Update);
    if columns.is_empty() {
        return Ok(0);
    }
    let (sql, params) = SqlCompiler::compile_update(&meta.table, &columns, id);
    db.execute_sql(&sql, &params).await
}

/// Deletes row `id`; returns the affected count.
pub async fn delete_by_id(db: &dyn DbExecutor, meta: &ModelMeta, id: i64) -> StrataResult<u64> {
    let (sql, params) = SqlCompiler::compile_delete(&by_id(&meta.table, id));
    db.execute_sql(&sql, &params).await
}

/// Fetches row `id`, if it exists.
pub async fn fetch_by_id(
    db: &dyn DbExecutor,
    meta: &ModelMeta,
    id: i64,
) -> StrataResult<Option<Row>> {
    let mut query = by_id(&meta.table, id);
    query.limit = Some(1);
    let (sql, params) = SqlCompiler::compile_select(&query);
    Ok(db.query(&sql, &params).await?.into_iter().next())
}

/// Serializes a raw row of `meta`'s table; see [`ModelMeta::row_to_json`].
pub fn row_to_json(meta: &ModelMeta, row: &Row) -> serde_json::Value {
    serde_json::Value::Object(meta.row_to_json(row))
}

// ── Active record ──────────────────────────────────────────────────────

/// Persistence methods available on every [`Model`].
#[async_trait]
pub trait ActiveRecord: Model {
    /// Creates the model's table and junction tables if absent.
    async fn create_table(db: &dyn DbExecutor, registry: &ModelRegistry) -> StrataResult<()>;

    /// Drops the model's junction tables and table if present.
    async fn drop_table(db: &dyn DbExecutor) -> StrataResult<()>;

    /// Inserts or updates this instance.
    async fn save(&mut self, db: &dyn DbExecutor) -> StrataResult<()>;

    /// Deletes this instance.
    async fn delete(self, db: &dyn DbExecutor) -> StrataResult<()>;

    /// Reloads this instance from the database.
    async fn refresh(&mut self, db: &dyn DbExecutor) -> StrataResult<()>;
}

#[async_trait]
impl<M: Model> ActiveRecord for M {
    async fn create_table(db: &dyn DbExecutor, registry: &ModelRegistry) -> StrataResult<()> {
        create_table_for(db, M::meta(), registry).await
    }

    async fn drop_table(db: &dyn DbExecutor) -> StrataResult<()> {
        drop_table_for(db, M::meta()).await
    }

    async fn save(&mut self, db: &dyn DbExecutor) -> StrataResult<()> {
        save_model(self, db).await
    }

    async fn delete(self, db: &dyn DbExecutor) -> StrataResult<()> {
        delete_model(self, db).await
    }

    async fn refresh(&mut self, db: &dyn DbExecutor) -> StrataResult<()> {
        refresh_model(self, db).await
    }
}
