//! An in-memory SQLite database for tests.
//!
//! [`TestDatabase`] wraps a [`SqliteBackend`] and counts every statement it
//! runs, so tests can pin down how many queries an operation issues. It
//! implements [`DbExecutor`] and works anywhere the ORM takes one.
//!
//! ```rust,no_run
//! use strata_db::registry::ModelRegistry;
//! use strata_test::test_database::TestDatabase;
//!
//! async fn example(registry: &ModelRegistry) {
//!     let db = TestDatabase::new();
//!     db.setup_registry(registry).await.unwrap();
//!     assert_eq!(db.query_count(), 0);
//! }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use strata_core::StrataResult;
use strata_db::executor::{create_all_tables, create_table_for, DbExecutor};
use strata_db::model::ModelMeta;
use strata_db::query::{Row, Statement};
use strata_db::registry::ModelRegistry;
use strata_db::value::Value;
use strata_db_backends::SqliteBackend;

/// A fresh in-memory database with a statement counter.
///
/// Clones share the database and the counter.
#[derive(Debug, Clone)]
pub struct TestDatabase {
    backend: Arc<SqliteBackend>,
    query_count: Arc<AtomicUsize>,
}

impl TestDatabase {
    /// Opens a new, empty in-memory database.
    ///
    /// # Panics
    ///
    /// Panics if SQLite cannot open an in-memory database.
    pub fn new() -> Self {
        let backend =
            SqliteBackend::memory().expect("Failed to create in-memory SQLite database");
        Self {
            backend: Arc::new(backend),
            query_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates the tables of every registered model. Setup statements are
    /// not counted.
    pub async fn setup_registry(&self, registry: &ModelRegistry) -> StrataResult<()> {
        create_all_tables(self.backend.as_ref(), registry).await
    }

    /// Creates one model's table. Not counted.
    pub async fn setup_table(&self, meta: &ModelMeta, registry: &ModelRegistry) -> StrataResult<()> {
        create_table_for(self.backend.as_ref(), meta, registry).await
    }

    /// Drops every user table. Not counted.
    pub async fn teardown(&self) -> StrataResult<()> {
        let rows = self
            .backend
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
                &[],
            )
            .await?;
        self.backend.execute_sql("PRAGMA foreign_keys = OFF", &[]).await?;
        for row in &rows {
            let table: String = row.get("name")?;
            self.backend
                .execute_sql(&format!("DROP TABLE IF EXISTS \"{table}\""), &[])
                .await?;
        }
        self.backend.execute_sql("PRAGMA foreign_keys = ON", &[]).await?;
        Ok(())
    }

    /// Runs a parameterless statement. Counted.
    pub async fn execute_raw(&self, sql: &str) -> StrataResult<u64> {
        self.execute_sql(sql, &[]).await
    }

    /// Statements run since creation or the last reset.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    pub fn reset_query_count(&self) {
        self.query_count.store(0, Ordering::Relaxed);
    }

    /// The wrapped backend. Statements run on it directly are not counted.
    pub fn backend(&self) -> &SqliteBackend {
        &self.backend
    }

    fn count(&self, n: usize) {
        self.query_count.fetch_add(n, Ordering::Relaxed);
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DbExecutor for TestDatabase {
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> StrataResult<u64> {
        self.count(1);
        self.backend.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> StrataResult<Vec<Row>> {
        self.count(1);
        self.backend.query(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> StrataResult<i64> {
        self.count(1);
        self.backend.insert_returning_id(sql, params).await
    }

    /// Each statement of the batch counts once.
    async fn execute_atomic(&self, statements: &[Statement]) -> StrataResult<u64> {
        self.count(statements.len());
        self.backend.execute_atomic(statements).await
    }
}
