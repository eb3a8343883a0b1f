//! The permission service.
//!
//! A permission is a codename of the form `<verb>_<model>` (e.g.
//! `add_post`). A user holds a permission when it is granted directly or
//! to any group the user belongs to; superusers hold every permission and
//! inactive users hold none.
//!
//! Single grants are check-then-insert, so granting twice is harmless.
//! The `set_*` operations replace every link of one owner inside a single
//! transaction.

use std::collections::BTreeSet;

use strata_core::{StrataError, StrataResult};
use strata_db::executor::DbExecutor;
use strata_db::model::Model;
use strata_db::naming::quote_ident;
use strata_db::registry::{ModelRegistry, PermissionAction};
use strata_db::related::Related;
use strata_db::schema::JunctionTable;
use strata_db::value::Value;

use crate::models::{Group, GroupPermission, Permission, User, UserGroup, UserPermission};

/// The codename for `action` on `model`.
///
/// ```
/// use strata_auth::permissions::codename;
/// use strata_db::registry::PermissionAction;
///
/// assert_eq!(codename(PermissionAction::Add, "BlogPost"), "add_blogpost");
/// ```
pub fn codename(action: PermissionAction, model: &str) -> String {
    format!("{}_{}", action.as_str(), model.to_lowercase())
}

/// Creates one permission per allowed verb of every registered model.
///
/// Existing codenames are left alone. Returns how many were created.
pub async fn sync_permissions(db: &dyn DbExecutor, registry: &ModelRegistry) -> StrataResult<u64> {
    let mut created = 0;
    for entry in registry.list() {
        for action in &entry.permissions {
            let code = codename(*action, &entry.name);
            if find_permission(db, &code).await?.is_some() {
                continue;
            }
            Permission::objects()
                .create(
                    Permission {
                        id: None,
                        codename: code,
                        name: format!("Can {action} {}", entry.display_name.to_lowercase()),
                        model_name: entry.name.clone(),
                    },
                    db,
                )
                .await?;
            created += 1;
        }
    }
    tracing::info!(created, "Synchronized permissions");
    Ok(created)
}

/// Looks a permission up by codename.
pub async fn find_permission(db: &dyn DbExecutor, code: &str) -> StrataResult<Option<Permission>> {
    Permission::objects()
        .get(&[("codename", Value::from(code))], db)
        .await
}

async fn require_permission(db: &dyn DbExecutor, code: &str) -> StrataResult<i64> {
    find_permission(db, code)
        .await?
        .and_then(|p| p.id)
        .ok_or_else(|| StrataError::NotFound(format!("Permission '{code}' does not exist")))
}

fn user_permissions() -> Related {
    Related::from_junction(JunctionTable::with_columns(
        UserPermission::table_name(),
        User::table_name(),
        "user_id",
        Permission::table_name(),
        "permission_id",
    ))
}

fn group_permissions() -> Related {
    Related::from_junction(JunctionTable::with_columns(
        GroupPermission::table_name(),
        Group::table_name(),
        "group_id",
        Permission::table_name(),
        "permission_id",
    ))
}

fn user_groups() -> Related {
    Related::from_junction(JunctionTable::with_columns(
        UserGroup::table_name(),
        User::table_name(),
        "user_id",
        Group::table_name(),
        "group_id",
    ))
}

fn saved_id<M: Model>(instance: &M) -> StrataResult<i64> {
    instance.id().ok_or_else(|| {
        StrataError::InvalidOperation(format!("{} has not been saved", M::model_name()))
    })
}

/// Grants `code` directly to `user`. Returns `false` if already granted.
pub async fn grant_user_permission(db: &dyn DbExecutor, user: &User, code: &str) -> StrataResult<bool> {
    let user_id = saved_id(user)?;
    let permission_id = require_permission(db, code).await?;
    user_permissions().add(db, user_id, permission_id).await
}

/// Revokes a direct grant. Group-derived permissions are unaffected.
pub async fn revoke_user_permission(db: &dyn DbExecutor, user: &User, code: &str) -> StrataResult<bool> {
    let user_id = saved_id(user)?;
    let permission_id = require_permission(db, code).await?;
    user_permissions().remove(db, user_id, permission_id).await
}

/// Grants `code` to every member of `group`.
pub async fn grant_group_permission(db: &dyn DbExecutor, group: &Group, code: &str) -> StrataResult<bool> {
    let group_id = saved_id(group)?;
    let permission_id = require_permission(db, code).await?;
    group_permissions().add(db, group_id, permission_id).await
}

/// Revokes a group grant.
pub async fn revoke_group_permission(db: &dyn DbExecutor, group: &Group, code: &str) -> StrataResult<bool> {
    let group_id = saved_id(group)?;
    let permission_id = require_permission(db, code).await?;
    group_permissions().remove(db, group_id, permission_id).await
}

/// Adds `user` to `group`. Returns `false` if already a member.
pub async fn add_user_to_group(db: &dyn DbExecutor, user: &User, group: &Group) -> StrataResult<bool> {
    user_groups().add(db, saved_id(user)?, saved_id(group)?).await
}

/// Removes `user` from `group`.
pub async fn remove_user_from_group(db: &dyn DbExecutor, user: &User, group: &Group) -> StrataResult<bool> {
    user_groups().remove(db, saved_id(user)?, saved_id(group)?).await
}

/// Replaces the groups of `user`.
pub async fn set_user_groups(db: &dyn DbExecutor, user: &User, group_ids: &[i64]) -> StrataResult<()> {
    user_groups().set(db, saved_id(user)?, group_ids).await
}

async fn resolve_codenames(db: &dyn DbExecutor, codes: &[&str]) -> StrataResult<Vec<i64>> {
    let mut ids = Vec::with_capacity(codes.len());
    for code in codes {
        ids.push(require_permission(db, code).await?);
    }
    Ok(ids)
}

/// Replaces the direct grants of `user`. Every codename must exist.
pub async fn set_user_permissions(db: &dyn DbExecutor, user: &User, codes: &[&str]) -> StrataResult<()> {
    let user_id = saved_id(user)?;
    let ids = resolve_codenames(db, codes).await?;
    user_permissions().set(db, user_id, &ids).await
}

/// Replaces the grants of `group`. Every codename must exist.
pub async fn set_group_permissions(db: &dyn DbExecutor, group: &Group, codes: &[&str]) -> StrataResult<()> {
    let group_id = saved_id(group)?;
    let ids = resolve_codenames(db, codes).await?;
    group_permissions().set(db, group_id, &ids).await
}

/// The codenames `user_id` holds directly or through its groups.
pub async fn get_user_permissions(db: &dyn DbExecutor, user_id: i64) -> StrataResult<BTreeSet<String>> {
    let perms = quote_ident(Permission::table_name());
    let sql = format!(
        "SELECT p.\"codename\" FROM {perms} p \
         JOIN {up} up ON up.\"permission_id\" = p.\"id\" \
         WHERE up.\"user_id\" = ? \
         UNION \
         SELECT p.\"codename\" FROM {perms} p \
         JOIN {gp} gp ON gp.\"permission_id\" = p.\"id\" \
         JOIN {ug} ug ON ug.\"group_id\" = gp.\"group_id\" \
         WHERE ug.\"user_id\" = ?",
        up = quote_ident(UserPermission::table_name()),
        gp = quote_ident(GroupPermission::table_name()),
        ug = quote_ident(UserGroup::table_name()),
    );
    db.query(&sql, &[Value::Int(user_id), Value::Int(user_id)])
        .await?
        .iter()
        .map(|row| row.get_by_index::<String>(0))
        .collect()
}

/// Returns `true` if `user` holds `code`.
pub async fn has_perm(db: &dyn DbExecutor, user: &User, code: &str) -> StrataResult<bool> {
    if !user.is_active {
        return Ok(false);
    }
    if user.is_superuser {
        return Ok(true);
    }
    let Some(user_id) = user.id else {
        return Ok(false);
    };
    Ok(get_user_permissions(db, user_id).await?.contains(code))
}
