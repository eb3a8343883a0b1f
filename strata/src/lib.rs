//! # strata
//!
//! A Django-style ORM, model registry, permission system and admin service
//! over SQLite.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient
//! access. Depend on `strata` to get everything, or on individual crates for
//! finer-grained control. Models derived with `#[derive(Model)]` refer to
//! `strata_db` by path, so crates using the derive also need `strata-db` as
//! a direct dependency.
//!
//! ```rust,no_run
//! use strata::prelude::*;
//!
//! async fn bootstrap(settings: &Settings) -> StrataResult<()> {
//!     setup_logging(settings);
//!     let db = SqliteBackend::from_settings(&settings.database)?;
//!     let registry = ModelRegistry::new();
//!     register_auth_models(&registry)?;
//!     create_all_tables(&db, &registry).await?;
//!     sync_permissions(&db, &registry).await?;
//!     Ok(())
//! }
//! ```

/// Errors, settings, and logging setup.
pub use strata_core as core;

/// `#[derive(Model)]`.
#[cfg(feature = "macros")]
pub use strata_macros as macros;

/// ORM: fields, models, registry, `QuerySet`, and persistence.
pub use strata_db as db;

/// Database backends.
pub use strata_db_backends as db_backends;

/// Users, groups, permissions, and password hashing.
#[cfg(feature = "auth")]
pub use strata_auth as auth;

/// Permission-gated CRUD over registered models.
#[cfg(feature = "admin")]
pub use strata_admin as admin;

/// Test database and query-count assertions.
#[cfg(feature = "testing")]
pub use strata_test as test;

// Third-party crates the public API is built on.
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tracing;

/// The names most applications need, in one import.
pub mod prelude {
    pub use strata_core::logging::setup_logging;
    pub use strata_core::settings::Settings;
    pub use strata_core::{StrataError, StrataResult, ValidationError};

    pub use strata_db::executor::{create_all_tables, drop_all_tables, ActiveRecord, DbExecutor};
    pub use strata_db::fields::{FieldDef, ReferentialAction};
    pub use strata_db::model::{ManyToMany, Model, ModelMeta};
    pub use strata_db::query::{Manager, OrderBy, QuerySet};
    pub use strata_db::registry::{ModelRegistry, PermissionAction, RegisterOptions};
    pub use strata_db::related::Related;
    pub use strata_db::value::Value;

    #[cfg(feature = "sqlite")]
    pub use strata_db_backends::SqliteBackend;

    #[cfg(feature = "macros")]
    pub use strata_macros::Model;

    #[cfg(feature = "auth")]
    pub use strata_auth::{
        authenticate, create_superuser, create_user, has_perm, register_auth_models,
        sync_permissions, Caller, Group, Permission, User,
    };

    #[cfg(feature = "admin")]
    pub use strata_admin::{AdminService, ListParams};
}
