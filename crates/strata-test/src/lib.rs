//! # strata-test
//!
//! Test support for code built on strata:
//!
//! - [`TestDatabase`]: an isolated in-memory SQLite database that counts the
//!   statements it runs
//! - [`assert_num_queries`] / [`assert_max_queries`]: pin the number of
//!   statements an operation issues

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod assert_queries;
pub mod test_database;

pub use assert_queries::{assert_max_queries, assert_num_queries};
pub use test_database::TestDatabase;
