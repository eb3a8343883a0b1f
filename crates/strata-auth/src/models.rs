//! The auth tables.
//!
//! Users, groups and permissions are ordinary models. Their links are
//! explicit junction models rather than many-to-many fields, so the
//! permission service can address each row directly. Every junction foreign
//! key cascades on delete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strata_core::StrataResult;
use strata_db::fields::now;
use strata_db::registry::{ModelRegistry, RegisterOptions};
use strata_macros::Model;

/// An account.
#[derive(Debug, Clone, PartialEq, Serialize, Model)]
#[model(table = "auth_users")]
pub struct User {
    pub id: Option<i64>,

    #[field(max_length = 150, unique)]
    pub username: String,

    #[field(email)]
    pub email: String,

    /// The encoded password hash; never serialized.
    #[field(max_length = 128, hidden, default = "!")]
    #[serde(skip_serializing)]
    pub password: String,

    #[field(max_length = 150, default = "")]
    pub first_name: String,

    #[field(max_length = 150, default = "")]
    pub last_name: String,

    #[field(default = "true")]
    pub is_active: bool,

    #[field(default = "false")]
    pub is_staff: bool,

    #[field(default = "false")]
    pub is_superuser: bool,

    #[field(default_fn = "now")]
    pub date_joined: Option<DateTime<Utc>>,

    #[field(null)]
    pub last_login: Option<DateTime<Utc>>,
}

/// A named set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Model)]
#[model(table = "auth_groups")]
pub struct Group {
    pub id: Option<i64>,

    #[field(max_length = 150, unique)]
    pub name: String,
}

/// One verb on one model, e.g. `add_post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Model)]
#[model(table = "auth_permissions")]
pub struct Permission {
    pub id: Option<i64>,

    #[field(max_length = 100, unique)]
    pub codename: String,

    #[field(max_length = 255)]
    pub name: String,

    #[field(max_length = 100)]
    pub model_name: String,
}

/// A permission granted directly to a user.
#[derive(Debug, Clone, PartialEq, Eq, Model)]
#[model(table = "auth_user_permissions")]
pub struct UserPermission {
    pub id: Option<i64>,

    #[field(foreign_key = "User")]
    pub user_id: i64,

    #[field(foreign_key = "Permission")]
    pub permission_id: i64,
}

/// A permission granted to every member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Model)]
#[model(table = "auth_group_permissions")]
pub struct GroupPermission {
    pub id: Option<i64>,

    #[field(foreign_key = "Group")]
    pub group_id: i64,

    #[field(foreign_key = "Permission")]
    pub permission_id: i64,
}

/// Group membership.
#[derive(Debug, Clone, PartialEq, Eq, Model)]
#[model(table = "auth_user_groups")]
pub struct UserGroup {
    pub id: Option<i64>,

    #[field(foreign_key = "User")]
    pub user_id: i64,

    #[field(foreign_key = "Group")]
    pub group_id: i64,
}

/// Registers the six auth models under the "auth" app.
///
/// Targets are registered before the junction models that reference them.
/// The password column is excluded from admin output on top of being hidden.
pub fn register_auth_models(registry: &ModelRegistry) -> StrataResult<()> {
    let auth = || RegisterOptions::new().app("auth");

    registry.register::<Permission>(
        auth()
            .icon("key")
            .search_fields(&["codename", "name"])
            .filter_fields(&["model_name"])
            .list_display(&["codename", "name", "model_name"]),
    )?;
    registry.register::<Group>(auth().icon("users").search_fields(&["name"]))?;
    registry.register::<User>(
        auth()
            .icon("user")
            .exclude(&["password"])
            .search_fields(&["username", "email", "first_name", "last_name"])
            .filter_fields(&["is_active", "is_staff", "is_superuser"])
            .list_display(&["username", "email", "is_staff", "is_active"]),
    )?;
    registry.register::<UserGroup>(auth().display_name("User group"))?;
    registry.register::<UserPermission>(auth().display_name("User permission"))?;
    registry.register::<GroupPermission>(auth().display_name("Group permission"))?;
    Ok(())
}
