//! Query-count assertions.
//!
//! Both helpers reset the counter of a [`TestDatabase`], await the closure's
//! future, then compare the number of statements it ran.
//!
//! ```rust,no_run
//! use strata_db::executor::DbExecutor;
//! use strata_test::assert_queries::assert_num_queries;
//! use strata_test::test_database::TestDatabase;
//!
//! async fn example() {
//!     let db = TestDatabase::new();
//!     db.execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY)").await.unwrap();
//!     assert_num_queries(&db, 1, || async {
//!         db.query("SELECT * FROM t", &[]).await.unwrap();
//!     })
//!     .await;
//! }
//! ```

use std::future::Future;

use crate::test_database::TestDatabase;

/// Asserts that exactly `expected_count` statements run during `f`.
///
/// # Panics
///
/// Panics if the count differs.
pub async fn assert_num_queries<F, Fut>(db: &TestDatabase, expected_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert_eq!(
        actual, expected_count,
        "Expected {expected_count} SQL queries, but {actual} were executed"
    );
}

/// Asserts that at most `max_count` statements run during `f`.
///
/// # Panics
///
/// Panics if more run.
pub async fn assert_max_queries<F, Fut>(db: &TestDatabase, max_count: usize, f: F)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    db.reset_query_count();
    f().await;
    let actual = db.query_count();
    assert!(
        actual <= max_count,
        "Expected at most {max_count} SQL queries, but {actual} were executed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_db::executor::DbExecutor;
    use strata_db::value::Value;

    async fn db_with(table: &str) -> TestDatabase {
        let db = TestDatabase::new();
        db.execute_raw(&format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY, val TEXT)"))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_assert_num_queries_passes() {
        let db = db_with("nq").await;
        assert_num_queries(&db, 2, || async {
            db.execute_sql("INSERT INTO nq (val) VALUES (?)", &[Value::from("a")])
                .await
                .unwrap();
            db.query("SELECT * FROM nq", &[]).await.unwrap();
        })
        .await;
    }

    #[tokio::test]
    async fn test_assert_num_queries_zero() {
        let db = TestDatabase::new();
        assert_num_queries(&db, 0, || async {}).await;
    }

    #[tokio::test]
    #[should_panic(expected = "Expected 1 SQL queries, but 2 were executed")]
    async fn test_assert_num_queries_fails_too_many() {
        let db = db_with("nqf").await;
        assert_num_queries(&db, 1, || async {
            db.execute_raw("DELETE FROM nqf").await.unwrap();
            db.execute_raw("DELETE FROM nqf").await.unwrap();
        })
        .await;
    }

    #[tokio::test]
    async fn test_assert_max_queries_passes() {
        let db = db_with("mq").await;
        assert_max_queries(&db, 3, || async {
            db.execute_raw("DELETE FROM mq").await.unwrap();
        })
        .await;
    }

    #[tokio::test]
    #[should_panic(expected = "Expected at most 1 SQL queries, but 2 were executed")]
    async fn test_assert_max_queries_fails() {
        let db = db_with("mqf").await;
        assert_max_queries(&db, 1, || async {
            db.query("SELECT * FROM mqf", &[]).await.unwrap();
            db.query("SELECT * FROM mqf", &[]).await.unwrap();
        })
        .await;
    }
}
