//! SQLite database backend using `rusqlite`.
//!
//! [`SqliteBackend`] owns one connection behind an async mutex. Every
//! statement runs on the blocking pool via `tokio::task::spawn_blocking`, so
//! statements never interleave.
//!
//! Features:
//! - WAL journal mode and `foreign_keys=ON` applied on open (configurable)
//! - In-memory database support via `:memory:` (useful for tests)
//! - Multi-statement batches in one transaction via `execute_atomic`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::ValueRef;
use strata_core::settings::DatabaseSettings;
use strata_core::{StrataError, StrataResult};
use strata_db::value::{format_datetime, Value};
use strata_db::{DbExecutor, Row, Statement};
use tokio::sync::Mutex;

const JOURNAL_MODES: [&str; 6] = ["delete", "truncate", "persist", "memory", "wal", "off"];

/// A SQLite database backend.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Opens a database at `path` with WAL and foreign keys enabled.
    ///
    /// A path of `:memory:` opens a private in-memory database.
    pub fn open(path: impl Into<PathBuf>) -> StrataResult<Self> {
        let settings = DatabaseSettings {
            path: path.into(),
            ..DatabaseSettings::default()
        };
        Self::from_settings(&settings)
    }

    /// Opens an in-memory database.
    pub fn memory() -> StrataResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database described by `settings`.
    pub fn from_settings(settings: &DatabaseSettings) -> StrataResult<Self> {
        let journal_mode = settings.journal_mode.to_lowercase();
        if !JOURNAL_MODES.contains(&journal_mode.as_str()) {
            return Err(StrataError::ConfigurationError(format!(
                "Unsupported SQLite journal_mode '{}'",
                settings.journal_mode
            )));
        }

        let path = settings.path.clone();
        let conn = if path.as_os_str() == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| StrataError::OperationalError(format!("SQLite open failed: {e}")))?;

        let foreign_keys = if settings.foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!(
            "PRAGMA journal_mode={journal_mode}; PRAGMA foreign_keys={foreign_keys};"
        ))
        .map_err(|e| StrataError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        tracing::info!(
            path = %path.display(),
            journal_mode = %journal_mode,
            foreign_keys,
            "Opened SQLite database"
        );

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StrataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> StrataResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.blocking_lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StrataError::DatabaseError(format!("Task join error: {e}")))?
    }

    /// Binds ORM values to a prepared statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> StrataResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, i64::from(*b)),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Date(d) => {
                    stmt.raw_bind_parameter(idx, d.format("%Y-%m-%d").to_string())
                }
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, format_datetime(dt)),
            }
            .map_err(|e| StrataError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to the ORM's `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| match sqlite_row.get_ref(i).unwrap_or(ValueRef::Null) {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(v) => Value::Int(v),
                ValueRef::Real(v) => Value::Float(v),
                ValueRef::Text(b) | ValueRef::Blob(b) => {
                    Value::String(String::from_utf8_lossy(b).into_owned())
                }
            })
            .collect();
        Row::new(column_names.to_vec(), values)
    }

    fn run_statement(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> StrataResult<u64> {
        tracing::debug!(sql, params = params.len(), "Executing SQL");
        let mut stmt = conn.prepare(sql).map_err(map_error)?;
        Self::bind_params(&mut stmt, params)?;
        let count = stmt.raw_execute().map_err(map_error)?;
        Ok(count as u64)
    }
}

/// Maps driver errors onto the error taxonomy: constraint violations become
/// `IntegrityError`, a busy or locked database `OperationalError`, and
/// everything else `DatabaseError`.
fn map_error(e: rusqlite::Error) -> StrataError {
    use rusqlite::ErrorCode;

    match &e {
        rusqlite::Error::SqliteFailure(err, _) => match err.code {
            ErrorCode::ConstraintViolation => StrataError::IntegrityError(e.to_string()),
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                StrataError::OperationalError(e.to_string())
            }
            _ => StrataError::DatabaseError(e.to_string()),
        },
        _ => StrataError::DatabaseError(e.to_string()),
    }
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> StrataResult<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_conn(move |conn| Self::run_statement(conn, &sql, &params))
            .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> StrataResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_conn(move |conn| {
            tracing::debug!(sql = %sql, params = params.len(), "Running query");
            let mut stmt = conn.prepare(&sql).map_err(map_error)?;
            let column_names: Vec<String> =
                stmt.column_names().into_iter().map(String::from).collect();
            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows.next().map_err(map_error)? {
                rows.push(Self::convert_row(row, &column_names));
            }
            Ok(rows)
        })
        .await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StrataResult<i64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_conn(move |conn| {
            Self::run_statement(conn, &sql, &params)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> StrataResult<u64> {
        let statements = statements.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_error)?;
            let mut total = 0;
            for statement in &statements {
                total += Self::run_statement(&tx, &statement.sql, &statement.params)?;
            }
            tx.commit().map_err(map_error)?;
            tracing::debug!(statements = statements.len(), "Committed atomic batch");
            Ok(total)
        })
        .await
    }
}
