//! # strata-db-backends
//!
//! Database backend implementations for strata. Each backend implements
//! [`strata_db::DbExecutor`] so the ORM can run against it.
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`, on by default)

#![allow(clippy::doc_markdown)]
#![allow(clippy::result_large_err)]
// significant_drop_tightening: false positives with mutex guards held for a whole statement
#![allow(clippy::significant_drop_tightening)]

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
