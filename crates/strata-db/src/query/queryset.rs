//! Lazy query sets and per-model managers.
//!
//! A [`QuerySet`] accumulates filters, ordering, and paging without running
//! anything. Terminal methods (`all`, `first`, `count`, `delete`) borrow the
//! query set, compile one statement, and run it; calling them again runs the
//! statement again.

use std::marker::PhantomData;

use strata_core::{StrataError, StrataResult};

use super::compiler::{OrderBy, Query, SqlCompiler};
use crate::executor::{save_model, DbExecutor};
use crate::model::Model;
use crate::value::Value;

/// A lazy, chainable query over one model type.
///
/// ```
/// # use std::sync::LazyLock;
/// # use strata_db::{fields::FieldDef, model::{Model, ModelMeta}, query::Row, value::Value};
/// # struct Post { id: Option<i64> }
/// # impl Model for Post {
/// #     fn meta() -> &'static ModelMeta {
/// #         static M: LazyLock<ModelMeta> = LazyLock::new(|| ModelMeta::new("Post", None, vec![
/// #             FieldDef::char("title", 200), FieldDef::boolean("is_published"),
/// #         ]));
/// #         &M
/// #     }
/// #     fn id(&self) -> Option<i64> { self.id }
/// #     fn set_id(&mut self, id: Option<i64>) { self.id = id; }
/// #     fn field_values(&self) -> Vec<(&'static str, Value)> { vec![] }
/// #     fn from_row(row: &Row) -> strata_core::StrataResult<Self> { Ok(Post { id: row.get("id")? }) }
/// # }
/// let qs = Post::objects()
///     .filter("is_published", true)
///     .order_by("-id")
///     .limit(5);
/// let (sql, params) = qs.to_sql();
/// assert_eq!(
///     sql,
///     "SELECT * FROM \"posts\" WHERE \"is_published\" = ? ORDER BY \"id\" DESC LIMIT 5"
/// );
/// assert_eq!(params, vec![Value::Int(1)]);
/// ```
pub struct QuerySet<M: Model> {
    query: Query,
    _model: PhantomData<M>,
}

impl<M: Model> Clone for QuerySet<M> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for QuerySet<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", &M::model_name())
            .field("query", &self.query)
            .finish()
    }
}

impl<M: Model> Default for QuerySet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> QuerySet<M> {
    /// An unfiltered query set over `M`'s table.
    pub fn new() -> Self {
        Self {
            query: Query::new(M::table_name()),
            _model: PhantomData,
        }
    }

    /// Adds `column = value` to the conjunction. Filtering a column again
    /// replaces its value; a NULL value matches `IS NULL`.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.add_filter(column, value);
        self
    }

    /// Adds several equality predicates.
    pub fn filter_all<K, V, I>(mut self, pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (column, value) in pairs {
            self.query.add_filter(column, value);
        }
        self
    }

    /// Orders by a column; `"-col"` orders descending.
    pub fn order_by(mut self, order: impl Into<OrderBy>) -> Self {
        self.query.order_by = Some(order.into());
        self
    }

    /// Limits the number of rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = Some(n);
        self
    }

    /// Skips the first `n` rows.
    pub fn offset(mut self, n: u64) -> Self {
        self.query.offset = Some(n);
        self
    }

    /// Returns the accumulated query.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The `SELECT` this query set would run.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        SqlCompiler::compile_select(&self.query)
    }

    /// The `SELECT COUNT(*)` this query set would run.
    pub fn count_sql(&self) -> (String, Vec<Value>) {
        SqlCompiler::compile_count(&self.query)
    }

    /// The `DELETE` this query set would run.
    pub fn delete_sql(&self) -> (String, Vec<Value>) {
        SqlCompiler::compile_delete(&self.query)
    }

    /// Runs the query and hydrates every row.
    pub async fn all(&self, db: &dyn DbExecutor) -> StrataResult<Vec<M>> {
        let (sql, params) = self.to_sql();
        let rows = db.query(&sql, &params).await?;
        rows.iter().map(M::from_row).collect()
    }

    /// Runs the query with `LIMIT 1` and returns the row, if any.
    pub async fn first(&self, db: &dyn DbExecutor) -> StrataResult<Option<M>> {
        let mut query = self.query.clone();
        query.limit = Some(1);
        let (sql, params) = SqlCompiler::compile_select(&query);
        let rows = db.query(&sql, &params).await?;
        rows.first().map(M::from_row).transpose()
    }

    /// Counts matching rows, ignoring ordering and paging.
    pub async fn count(&self, db: &dyn DbExecutor) -> StrataResult<u64> {
        let (sql, params) = self.count_sql();
        let rows = db.query(&sql, &params).await?;
        let count = rows
            .first()
            .map(|row| row.get_by_index::<i64>(0))
            .transpose()?
            .unwrap_or(0);
        u64::try_from(count)
            .map_err(|e| StrataError::DatabaseError(format!("Invalid row count {count}: {e}")))
    }

    /// Deletes matching rows; returns how many were removed.
    pub async fn delete(&self, db: &dyn DbExecutor) -> StrataResult<u64> {
        let (sql, params) = self.delete_sql();
        db.execute_sql(&sql, &params).await
    }
}

/// The entry point for model-level queries, returned by `M::objects()`.
pub struct Manager<M: Model> {
    _model: PhantomData<M>,
}

impl<M: Model> Default for Manager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> Manager<M> {
    /// Creates a manager.
    pub const fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }

    /// An unfiltered query set.
    pub fn all(&self) -> QuerySet<M> {
        QuerySet::new()
    }

    /// A query set filtered on one column.
    pub fn filter(&self, column: impl Into<String>, value: impl Into<Value>) -> QuerySet<M> {
        QuerySet::new().filter(column, value)
    }

    /// An ordered query set.
    pub fn order_by(&self, order: impl Into<OrderBy>) -> QuerySet<M> {
        QuerySet::new().order_by(order)
    }

    /// Fetches the single instance matching every pair, or `None`.
    ///
    /// More than one match is a `MultipleObjectsReturned` error.
    pub async fn get(
        &self,
        lookup: &[(&str, Value)],
        db: &dyn DbExecutor,
    ) -> StrataResult<Option<M>> {
        let qs = QuerySet::<M>::new()
            .filter_all(lookup.iter().map(|(c, v)| (*c, v.clone())))
            .limit(2);
        let mut found = qs.all(db).await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            _ => Err(StrataError::MultipleObjectsReturned(format!(
                "get() returned more than one {}",
                M::model_name()
            ))),
        }
    }

    /// Inserts `instance` and returns it with its id assigned.
    pub async fn create(&self, mut instance: M, db: &dyn DbExecutor) -> StrataResult<M> {
        save_model(&mut instance, db).await?;
        Ok(instance)
    }

    /// Counts every row.
    pub async fn count(&self, db: &dyn DbExecutor) -> StrataResult<u64> {
        QuerySet::<M>::new().count(db).await
    }
}
