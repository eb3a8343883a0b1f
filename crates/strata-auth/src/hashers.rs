//! Password hashing.
//!
//! Two backends are available: [`Argon2Hasher`] (the default) and
//! [`BcryptHasher`]. Both run their CPU-bound work on the blocking pool via
//! `tokio::task::spawn_blocking`. An encoded hash carries its algorithm in
//! its prefix, so [`check_password`] verifies any stored hash regardless of
//! which hasher is currently configured.
//!
//! A stored value starting with `!` is an unusable password: it never
//! verifies.

use async_trait::async_trait;
use strata_core::settings::AuthSettings;
use strata_core::{StrataError, StrataResult};

/// Marker prefix for unusable passwords.
pub const UNUSABLE_PASSWORD_PREFIX: &str = "!";

const BCRYPT_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

/// A password hashing backend.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    /// The algorithm identifier ("argon2", "bcrypt").
    fn algorithm(&self) -> &'static str;

    /// Hashes `password` into a self-describing encoded string.
    async fn hash(&self, password: &str) -> StrataResult<String>;

    /// Returns `true` if `password` matches `encoded`.
    async fn verify(&self, password: &str, encoded: &str) -> StrataResult<bool>;

    /// Returns `true` if `encoded` was produced with weaker parameters than
    /// this hasher's.
    fn must_update(&self, encoded: &str) -> bool;
}

fn join_error(e: tokio::task::JoinError) -> StrataError {
    StrataError::InternalServerError(format!("Task join error: {e}"))
}

/// Argon2id hasher with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

#[async_trait]
impl PasswordHasher for Argon2Hasher {
    fn algorithm(&self) -> &'static str {
        "argon2"
    }

    async fn hash(&self, password: &str) -> StrataResult<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || {
            use argon2::password_hash::{rand_core::OsRng, PasswordHasher as _, SaltString};
            use argon2::Argon2;

            let salt = SaltString::generate(&mut OsRng);
            let hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| StrataError::InternalServerError(format!("Argon2 hash error: {e}")))?;
            Ok(hash.to_string())
        })
        .await
        .map_err(join_error)?
    }

    async fn verify(&self, password: &str, encoded: &str) -> StrataResult<bool> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        tokio::task::spawn_blocking(move || {
            use argon2::password_hash::{PasswordHash, PasswordVerifier};
            use argon2::Argon2;

            let parsed = PasswordHash::new(&encoded)
                .map_err(|e| StrataError::InternalServerError(format!("Invalid hash: {e}")))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(join_error)?
    }

    fn must_update(&self, encoded: &str) -> bool {
        !encoded.starts_with("$argon2id$")
    }
}

/// bcrypt hasher.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    /// The cost factor (4..=31).
    pub cost: u32,
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    fn algorithm(&self) -> &'static str {
        "bcrypt"
    }

    async fn hash(&self, password: &str) -> StrataResult<String> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || {
            bcrypt::hash(password, cost)
                .map_err(|e| StrataError::InternalServerError(format!("Bcrypt hash error: {e}")))
        })
        .await
        .map_err(join_error)?
    }

    async fn verify(&self, password: &str, encoded: &str) -> StrataResult<bool> {
        let password = password.to_string();
        let encoded = encoded.to_string();
        tokio::task::spawn_blocking(move || {
            bcrypt::verify(password, &encoded)
                .map_err(|e| StrataError::InternalServerError(format!("Bcrypt verify error: {e}")))
        })
        .await
        .map_err(join_error)?
    }

    fn must_update(&self, encoded: &str) -> bool {
        // $2b$XX$...
        encoded
            .get(4..6)
            .and_then(|cost| cost.parse::<u32>().ok())
            .is_some_and(|stored| stored < self.cost)
    }
}

/// Builds the hasher named by `settings.password_hasher`.
pub fn hasher_from_settings(settings: &AuthSettings) -> StrataResult<Box<dyn PasswordHasher>> {
    match settings.password_hasher.to_lowercase().as_str() {
        "argon2" => Ok(Box::new(Argon2Hasher)),
        "bcrypt" => {
            if !BCRYPT_COSTS.contains(&settings.bcrypt_cost) {
                return Err(StrataError::ConfigurationError(format!(
                    "bcrypt_cost must be between {} and {}, got {}",
                    BCRYPT_COSTS.start(),
                    BCRYPT_COSTS.end(),
                    settings.bcrypt_cost
                )));
            }
            Ok(Box::new(BcryptHasher {
                cost: settings.bcrypt_cost,
            }))
        }
        other => Err(StrataError::ConfigurationError(format!(
            "Unknown password hasher '{other}'"
        ))),
    }
}

/// Picks the hasher that produced `encoded`, from its prefix.
pub fn identify_hasher(encoded: &str) -> Option<Box<dyn PasswordHasher>> {
    if encoded.starts_with("$argon2") {
        Some(Box::new(Argon2Hasher))
    } else if ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|p| encoded.starts_with(p))
    {
        Some(Box::new(BcryptHasher::default()))
    } else {
        None
    }
}

/// Hashes `password` with the default (Argon2) hasher.
pub async fn make_password(password: &str) -> StrataResult<String> {
    Argon2Hasher.hash(password).await
}

/// Checks `password` against a stored hash.
///
/// Unusable hashes never match. A hash whose algorithm cannot be identified
/// is an error rather than a silent mismatch.
pub async fn check_password(password: &str, encoded: &str) -> StrataResult<bool> {
    if !is_password_usable(encoded) {
        return Ok(false);
    }
    let hasher = identify_hasher(encoded).ok_or_else(|| {
        StrataError::InternalServerError(format!(
            "Unknown password hashing algorithm for hash: {}",
            encoded.chars().take(8).collect::<String>()
        ))
    })?;
    hasher.verify(password, encoded).await
}

/// Returns `false` for empty hashes and ones carrying the unusable marker.
pub fn is_password_usable(encoded: &str) -> bool {
    !encoded.is_empty() && !encoded.starts_with(UNUSABLE_PASSWORD_PREFIX)
}

/// Returns a fresh unusable password value: the marker followed by random
/// hex, so no two unusable values compare equal.
pub fn make_unusable_password() -> String {
    use rand::RngCore;
    use std::fmt::Write;

    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
        .iter()
        .fold(String::from(UNUSABLE_PASSWORD_PREFIX), |mut s, b| {
            let _ = write!(s, "{b:02x}");
            s
        })
}
