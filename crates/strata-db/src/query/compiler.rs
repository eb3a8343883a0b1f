//! Query representation and SQL compilation.
//!
//! A [`Query`] holds the state a [`QuerySet`](super::queryset::QuerySet)
//! accumulates. [`SqlCompiler`] turns it into one parameterized SQLite
//! statement. Parameters are narrowed with [`Value::to_storage`] here, so
//! backends only ever bind NULL, integers, floats, and text.

use chrono::{DateTime, NaiveDate, Utc};
use strata_core::{StrataError, StrataResult};

use crate::naming::quote_ident;
use crate::value::{parse_date, parse_datetime, Value};

/// A single ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The column to order by.
    pub column: String,
    /// Whether the order is descending.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `column`.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    /// Parses `"col"` (ascending) or `"-col"` (descending).
    pub fn parse(spec: &str) -> Self {
        spec.strip_prefix('-').map_or_else(|| Self::asc(spec), Self::desc)
    }
}

impl From<&str> for OrderBy {
    fn from(spec: &str) -> Self {
        Self::parse(spec)
    }
}

/// A case-insensitive substring search across several text columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    /// Columns matched with `LIKE`.
    pub columns: Vec<String>,
    /// The search term, matched anywhere in the column.
    pub term: String,
}

/// The accumulated state of a query against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The table being queried.
    pub table: String,
    /// Equality predicates, joined with AND. Each column appears once.
    pub filters: Vec<(String, Value)>,
    /// Optional OR-of-LIKE search, ANDed with the filters.
    pub search: Option<Search>,
    /// Optional ordering.
    pub order_by: Option<OrderBy>,
    /// Optional row limit.
    pub limit: Option<u64>,
    /// Optional row offset.
    pub offset: Option<u64>,
}

impl Query {
    /// Creates an unfiltered query on `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            search: None,
            order_by: None,
            limit: None,
            offset: None,
        }
    }

    /// Adds an equality predicate; filtering the same column again replaces
    /// its value.
    pub fn add_filter(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.filters.iter_mut().find(|(c, _)| *c == column) {
            slot.1 = value;
        } else {
            self.filters.push((column, value));
        }
    }

    /// Restricts the query to rows where any of `columns` contains `term`.
    pub fn search(&mut self, columns: Vec<String>, term: impl Into<String>) {
        self.search = Some(Search {
            columns,
            term: term.into(),
        });
    }
}

/// One statement with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The SQL text with `?` placeholders.
    pub sql: String,
    /// Bound parameters, in placeholder order.
    pub params: Vec<Value>,
}

impl Statement {
    /// Creates a statement.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Compiles [`Query`] values and row writes into SQLite statements.
pub struct SqlCompiler;

impl SqlCompiler {
    /// `SELECT * FROM t [WHERE ...] [ORDER BY ...] [LIMIT n] [OFFSET m]`
    pub fn compile_select(query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT * FROM {}", quote_ident(&query.table));
        sql.push_str(&Self::compile_where(query, &mut params));

        if let Some(order) = &query.order_by {
            sql.push_str(&format!(
                " ORDER BY {} {}",
                quote_ident(&order.column),
                if order.descending { "DESC" } else { "ASC" }
            ));
        }

        // SQLite integers are signed 64-bit; larger values would be sent as REAL.
        match (query.limit.map(sql_bound), query.offset.map(sql_bound)) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT clause.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        (sql, params)
    }

    /// `SELECT COUNT(*) FROM t [WHERE ...]`; ordering and paging are ignored.
    pub fn compile_count(query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&query.table));
        sql.push_str(&Self::compile_where(query, &mut params));
        (sql, params)
    }

    /// `DELETE FROM t [WHERE ...]`; ordering and paging are ignored.
    pub fn compile_delete(query: &Query) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", quote_ident(&query.table));
        sql.push_str(&Self::compile_where(query, &mut params));
        (sql, params)
    }

    /// `INSERT INTO t (cols) VALUES (?, ...)`, or `DEFAULT VALUES` when no
    /// column is supplied.
    pub fn compile_insert(table: &str, columns: &[(&str, Value)]) -> (String, Vec<Value>) {
        if columns.is_empty() {
            return (
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)),
                Vec::new(),
            );
        }
        let names: Vec<String> = columns.iter().map(|(c, _)| quote_ident(c)).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let params = columns.iter().map(|(_, v)| v.to_storage()).collect();
        (
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders})",
                quote_ident(table),
                names.join(", ")
            ),
            params,
        )
    }

    /// `UPDATE t SET c = ?, ... WHERE "id" = ?`
    pub fn compile_update(table: &str, columns: &[(&str, Value)], id: i64) -> (String, Vec<Value>) {
        let assignments: Vec<String> = columns
            .iter()
            .map(|(c, _)| format!("{} = ?", quote_ident(c)))
            .collect();
        let mut params: Vec<Value> = columns.iter().map(|(_, v)| v.to_storage()).collect();
        params.push(Value::Int(id));
        (
            format!(
                "UPDATE {} SET {} WHERE \"id\" = ?",
                quote_ident(table),
                assignments.join(", ")
            ),
            params,
        )
    }

    fn compile_where(query: &Query, params: &mut Vec<Value>) -> String {
        let mut predicates: Vec<String> = Vec::new();

        for (column, value) in &query.filters {
            if value.is_null() {
                predicates.push(format!("{} IS NULL", quote_ident(column)));
            } else {
                predicates.push(format!("{} = ?", quote_ident(column)));
                params.push(value.to_storage());
            }
        }

        if let Some(search) = query.search.as_ref().filter(|s| !s.columns.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.term));
            let likes: Vec<String> = search
                .columns
                .iter()
                .map(|c| {
                    params.push(Value::String(pattern.clone()));
                    format!("{} LIKE ? ESCAPE '\\'", quote_ident(c))
                })
                .collect();
            predicates.push(format!("({})", likes.join(" OR ")));
        }

        if predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", predicates.join(" AND "))
        }
    }
}

fn sql_bound(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One result row: column names and their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `columns` and `values` must have the same length.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(
            columns.len(),
            values.len(),
            "Row column count must match value count"
        );
        Self { columns, values }
    }

    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Gets a typed value by column name.
    pub fn get<T: FromValue>(&self, column: &str) -> StrataResult<T> {
        let value = self.get_value(column).ok_or_else(|| {
            StrataError::DatabaseError(format!("Column '{column}' not found in row"))
        })?;
        T::from_value(value).map_err(|e| match e {
            StrataError::DatabaseError(msg) => {
                StrataError::DatabaseError(format!("Column '{column}': {msg}"))
            }
            other => other,
        })
    }

    /// Gets a typed value by column position.
    pub fn get_by_index<T: FromValue>(&self, idx: usize) -> StrataResult<T> {
        let value = self.values.get(idx).ok_or_else(|| {
            StrataError::DatabaseError(format!(
                "Column index {idx} out of bounds (row has {} columns)",
                self.values.len()
            ))
        })?;
        T::from_value(value)
    }

    /// Returns the raw value of a column.
    pub fn get_value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Iterates over `(column, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// Conversion from a stored [`Value`] to a Rust type.
pub trait FromValue: Sized {
    /// Attempts the conversion.
    fn from_value(value: &Value) -> StrataResult<Self>;
}

fn mismatch(expected: &str, value: &Value) -> StrataError {
    StrataError::DatabaseError(format!("Expected {expected}, got {value:?}"))
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Int(i) => Ok(*i),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Int(i) => Self::try_from(*i)
                .map_err(|e| StrataError::DatabaseError(format!("Int value out of i32 range: {e}"))),
            _ => Err(mismatch("Int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            Value::Int(i) => Ok(*i as Self),
            _ => Err(mismatch("Float", value)),
        }
    }
}

/// Booleans are stored as 0/1, so integers convert too.
impl FromValue for bool {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            _ => Err(mismatch("Bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::String(s) => parse_datetime(s).ok_or_else(|| mismatch("DateTime", value)),
            _ => Err(mismatch("DateTime", value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::String(s) => parse_date(s).ok_or_else(|| mismatch("Date", value)),
            _ => Err(mismatch("Date", value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> StrataResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> StrataResult<Self> {
        match value {
            Value::Null => Ok(None),
            _ => T::from_value(value).map(Some),
        }
    }
}
