//! # strata-auth
//!
//! Users, groups and per-model permissions stored through the strata ORM.
//!
//! - **Password hashing** with Argon2 and bcrypt (`hashers`)
//! - **Auth models** and their registration (`models`)
//! - **Account operations**: creation, authentication (`user`)
//! - **Permission service**: sync, grants, group membership (`permissions`)
//! - **Caller identity** consumed by the admin service (`caller`)
//!
//! Hashing runs on the blocking pool via `tokio::task::spawn_blocking`.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod caller;
pub mod hashers;
pub mod models;
pub mod permissions;
pub mod user;

pub use caller::Caller;
pub use hashers::{
    check_password, hasher_from_settings, is_password_usable, make_password, Argon2Hasher,
    BcryptHasher, PasswordHasher,
};
pub use models::{register_auth_models, Group, GroupPermission, Permission, User, UserGroup, UserPermission};
pub use permissions::{codename, has_perm, sync_permissions};
pub use user::{authenticate, create_superuser, create_user};
