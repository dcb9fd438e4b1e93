//! Password policy and argon2id hashing.
//!
//! Hashes are stored in PHC string format so parameters travel with the hash.
//! [`verify_dummy`] burns the same amount of work as a real verification and is
//! used on the unknown-user login path.
//!
//! Async callers go through [`hash`], [`verify`] and [`verify_unknown`], which
//! run argon2 on tokio's blocking pool.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;
use std::sync::OnceLock;

use super::IdentityError;

const DEFAULT_MIN_LENGTH: usize = 6;

/// Composition rules applied by `create_user` before hashing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_digit: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_non_alphanumeric: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            require_digit: true,
            require_lowercase: true,
            require_uppercase: true,
            require_non_alphanumeric: true,
        }
    }
}

impl PasswordPolicy {
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Only a length floor of one character, for tests.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            min_length: 1,
            require_digit: false,
            require_lowercase: false,
            require_uppercase: false,
            require_non_alphanumeric: false,
        }
    }

    /// Return every rule the password breaks, in a stable order.
    #[must_use]
    pub fn validate(&self, password: &str) -> Vec<IdentityError> {
        let mut errors = Vec::new();

        if password.chars().count() < self.min_length {
            errors.push(IdentityError::new(
                "PasswordTooShort",
                format!("Passwords must be at least {} characters.", self.min_length),
            ));
        }
        if self.require_non_alphanumeric && password.chars().all(char::is_alphanumeric) {
            errors.push(IdentityError::new(
                "PasswordRequiresNonAlphanumeric",
                "Passwords must have at least one non alphanumeric character.",
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(IdentityError::new(
                "PasswordRequiresDigit",
                "Passwords must have at least one digit ('0'-'9').",
            ));
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_ascii_lowercase()) {
            errors.push(IdentityError::new(
                "PasswordRequiresLower",
                "Passwords must have at least one lowercase ('a'-'z').",
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            errors.push(IdentityError::new(
                "PasswordRequiresUpper",
                "Passwords must have at least one uppercase ('A'-'Z').",
            ));
        }

        errors
    }
}

/// Hash a password with argon2id and a random salt.
///
/// # Errors
/// Returns an error if argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash password"))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored PHC hash.
///
/// # Errors
/// Returns an error if the stored hash cannot be parsed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| anyhow!("invalid password hash"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

fn dummy_hash() -> Option<&'static str> {
    DUMMY_HASH
        .get_or_init(|| hash_password("membership-dummy-password").ok())
        .as_deref()
}

/// Verify against a throwaway hash so a missing user costs as much as a
/// wrong password. Always returns `false`.
pub fn verify_dummy(password: &str) -> bool {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(password, hash);
    }
    false
}

/// [`hash_password`] on the blocking pool.
///
/// # Errors
/// Returns an error if argon2 fails or the blocking task panics.
pub async fn hash(password: &str) -> Result<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("password hashing task failed")?
}

/// [`verify_password`] on the blocking pool.
///
/// # Errors
/// Returns an error if the stored hash is malformed or the task panics.
pub async fn verify(password: &str, stored_hash: &str) -> Result<bool> {
    let password = password.to_owned();
    let stored_hash = stored_hash.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .context("password verification task failed")?
}

/// [`verify_dummy`] on the blocking pool. Resolves to `Ok(false)`.
///
/// # Errors
/// Returns an error if the blocking task panics.
pub async fn verify_unknown(password: &str) -> Result<bool> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_dummy(&password))
        .await
        .context("password verification task failed")
}

/// Compute the dummy hash ahead of the first unknown-user login.
///
/// # Errors
/// Returns an error if the blocking task panics.
pub async fn warm_dummy_hash() -> Result<()> {
    tokio::task::spawn_blocking(|| {
        dummy_hash();
    })
    .await
    .context("dummy hash task failed")
}
