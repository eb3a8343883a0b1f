//! # strata-db
//!
//! ORM layer for strata. Provides the [`Model`](model::Model) trait for
//! typed records, the [`ModelRegistry`](registry::ModelRegistry) that maps
//! model names to metadata, [`QuerySet`](query::QuerySet) for building and
//! running queries, and the [`ActiveRecord`](executor::ActiveRecord)
//! operations that persist instances.
//!
//! ## Architecture
//!
//! A [`QuerySet`](query::QuerySet) accumulates a [`Query`](query::Query)
//! without touching the database. SQL is only produced when a terminal
//! method (`all`, `first`, `count`, `delete`) runs, at which point the
//! [`SqlCompiler`](query::SqlCompiler) renders a parameterized statement and
//! hands it to a [`DbExecutor`](executor::DbExecutor). Backends implement
//! `DbExecutor` in `strata-db-backends`.
//!
//! ## Module Overview
//!
//! - [`fields`] - Field descriptors and their DDL
//! - [`model`] - The [`Model`](model::Model) trait and [`ModelMeta`](model::ModelMeta)
//! - [`registry`] - The process-wide model registry
//! - [`schema`] - `CREATE TABLE` generation, including junction tables
//! - [`query`] - Query building and compilation
//! - [`executor`] - The executor trait and persistence operations
//! - [`related`] - Many-to-many association handles
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum

// - struct_excessive_bools: FieldDef carries one flag per column option
// - format_push_string: format! with push_str reads better for SQL generation
// - doc_markdown: SQL keywords in docs are not items
// - needless_pass_by_value: builder methods take owned values
// - return_self_not_must_use: builder pattern methods are self-documenting
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::result_large_err)]
// significant_drop_tightening: false positives with lock guards
#![allow(clippy::significant_drop_tightening)]

pub mod executor;
pub mod fields;
pub mod model;
pub mod naming;
pub mod query;
pub mod registry;
pub mod related;
pub mod schema;
pub mod value;

pub use executor::{
    create_all_tables, delete_model, drop_all_tables, refresh_model, save_model, ActiveRecord,
    DbExecutor,
};
pub use fields::{FieldDef, FieldDefault, FieldType, ReferentialAction};
pub use model::{ManyToMany, Model, ModelMeta};
pub use query::{Manager, OrderBy, Query, QuerySet, Row, SqlCompiler, Statement};
pub use registry::{FieldMetadata, ModelMetadata, ModelRegistry, PermissionAction, RegisterOptions};
pub use related::Related;
pub use schema::JunctionTable;
pub use value::Value;

// Re-exported so derived code only needs `::strata_db` in scope.
pub use strata_core::{StrataError, StrataResult};
