//! The identity an outer layer passes into permission-checked operations.

use std::collections::BTreeSet;

use serde::Serialize;
use strata_core::StrataResult;
use strata_db::executor::DbExecutor;
use strata_db::registry::PermissionAction;

use crate::models::User;
use crate::permissions::{codename, get_user_permissions};

/// A snapshot of a user's flags and permission codenames.
///
/// Permissions are loaded once, when the caller is built; later grants are
/// not seen by an existing `Caller`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Caller {
    /// Primary key of the user; `None` for anonymous callers.
    pub user_id: Option<i64>,
    /// Empty for anonymous callers.
    pub username: String,
    /// Inactive callers are denied everything, superuser or not.
    pub is_active: bool,
    /// Staff may enter the admin; what they see there depends on
    /// `permissions`.
    pub is_staff: bool,
    /// Holds every permission without an explicit grant.
    pub is_superuser: bool,
    /// Codenames such as `view_post`, direct and group-derived. Empty for
    /// superusers, which skip the lookup.
    pub permissions: BTreeSet<String>,
}

impl Caller {
    /// Builds the caller for `user`, loading its direct and group-derived
    /// permissions. Superusers and inactive users skip the lookup.
    pub async fn for_user(db: &dyn DbExecutor, user: &User) -> StrataResult<Self> {
        let permissions = match user.id {
            Some(id) if user.is_active && !user.is_superuser => {
                get_user_permissions(db, id).await?
            }
            _ => BTreeSet::new(),
        };
        Ok(Self {
            user_id: user.id,
            username: user.username.clone(),
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            permissions,
        })
    }

    /// An unauthenticated caller: inactive, no permissions.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether the caller stands for a stored user.
    pub const fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Active staff or superuser.
    pub const fn can_access_admin(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }

    /// Whether this caller may perform `action` on `model`.
    pub fn can(&self, action: PermissionAction, model: &str) -> bool {
        if !self.is_active {
            return false;
        }
        if self.is_superuser {
            return true;
        }
        self.permissions.contains(&codename(action, model))
    }
}
