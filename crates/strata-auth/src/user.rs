//! Account operations on [`User`].
//!
//! Passwords are hashed before they reach the model, so the `password`
//! column only ever holds an encoded hash or the unusable marker.

use chrono::Utc;
use strata_core::{StrataError, StrataResult, ValidationError};
use strata_db::executor::{ActiveRecord, DbExecutor};
use strata_db::model::Model;
use strata_db::value::Value;

use crate::hashers::{self, PasswordHasher, UNUSABLE_PASSWORD_PREFIX};
use crate::models::User;

impl User {
    /// Builds an unsaved, active, non-staff user with an unusable password.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: email.into(),
            password: UNUSABLE_PASSWORD_PREFIX.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: None,
            last_login: None,
        }
    }

    /// Hashes `raw` with `hasher` and stores the result. Does not save.
    pub async fn set_password(
        &mut self,
        hasher: &dyn PasswordHasher,
        raw: &str,
    ) -> StrataResult<()> {
        self.password = hasher.hash(raw).await?;
        Ok(())
    }

    /// Checks `raw` against the stored hash.
    pub async fn check_password(&self, raw: &str) -> StrataResult<bool> {
        hashers::check_password(raw, &self.password).await
    }

    /// Marks the password unusable. Does not save.
    pub fn set_unusable_password(&mut self) {
        self.password = hashers::make_unusable_password();
    }

    /// Returns `true` unless the password is empty or unusable.
    pub fn has_usable_password(&self) -> bool {
        hashers::is_password_usable(&self.password)
    }

    /// First and last name separated by a space, trimmed.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Looks a user up by username.
    pub async fn find_by_username(
        db: &dyn DbExecutor,
        username: &str,
    ) -> StrataResult<Option<Self>> {
        Self::objects()
            .get(&[("username", Value::from(username))], db)
            .await
    }
}

fn require_username(username: &str) -> StrataResult<()> {
    if username.trim().is_empty() {
        let mut errors = std::collections::BTreeMap::new();
        errors.insert(
            "username".to_string(),
            vec![ValidationError::new("The username must be set.", "required")],
        );
        return Err(StrataError::ValidationError(
            ValidationError::with_field_errors(errors),
        ));
    }
    Ok(())
}

/// Creates and saves a regular user. Without a password the account gets
/// an unusable one.
pub async fn create_user(
    db: &dyn DbExecutor,
    hasher: &dyn PasswordHasher,
    username: &str,
    email: &str,
    password: Option<&str>,
) -> StrataResult<User> {
    require_username(username)?;
    let mut user = User::new(username, email);
    match password {
        Some(raw) => user.set_password(hasher, raw).await?,
        None => user.set_unusable_password(),
    }
    user.save(db).await?;
    tracing::info!(username, user_id = ?user.id, "Created user");
    Ok(user)
}

/// Creates and saves a staff superuser.
pub async fn create_superuser(
    db: &dyn DbExecutor,
    hasher: &dyn PasswordHasher,
    username: &str,
    email: &str,
    password: &str,
) -> StrataResult<User> {
    require_username(username)?;
    let mut user = User::new(username, email);
    user.is_staff = true;
    user.is_superuser = true;
    user.set_password(hasher, password).await?;
    user.save(db).await?;
    tracing::info!(username, user_id = ?user.id, "Created superuser");
    Ok(user)
}

/// Verifies credentials and records the login.
///
/// Returns `None` for an unknown username, a wrong password, or an inactive
/// account. On success `last_login` is set to now and saved.
pub async fn authenticate(
    db: &dyn DbExecutor,
    username: &str,
    password: &str,
) -> StrataResult<Option<User>> {
    let Some(mut user) = User::find_by_username(db, username).await? else {
        tracing::debug!(username, "Authentication failed: unknown user");
        return Ok(None);
    };
    if !user.is_active {
        tracing::debug!(username, "Authentication refused: inactive user");
        return Ok(None);
    }
    if !user.check_password(password).await? {
        tracing::debug!(username, "Authentication failed: bad password");
        return Ok(None);
    }
    user.last_login = Some(Utc::now());
    user.save(db).await?;
    Ok(Some(user))
}
