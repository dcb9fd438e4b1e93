//! Identity boundary consumed by the account handlers.
//!
//! Handlers never touch credential storage directly. They go through
//! [`IdentityService`] (user creation, role membership, lookup, password check,
//! sign-in) and [`SessionStore`] (resolving and revoking issued sessions).
//! Two implementations exist: [`memory::MemoryIdentity`] for tests and local
//! runs, and [`postgres::PgIdentity`] backed by the migrated schema.

pub mod claims;
pub mod memory;
pub mod password;
pub mod postgres;
pub mod roles;
mod session;
pub mod validators;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use std::{fmt, time::Duration};
use uuid::Uuid;

pub use claims::{Claim, ClaimType, ClaimsPrincipal};
pub use password::PasswordPolicy;

/// Upper-case lookup key used for user names, emails and role names.
#[must_use]
pub fn normalize(key: &str) -> String {
    key.to_uppercase()
}

/// Stored user record.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: String,
    pub normalized_email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub security_stamp: String,
    pub concurrency_stamp: String,
}

impl User {
    /// Build a transient user with fresh id and stamps. Nothing is persisted
    /// until [`IdentityService::create_user`] succeeds.
    #[must_use]
    pub fn new(user_name: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            normalized_user_name: normalize(user_name),
            email: email.to_string(),
            normalized_email: normalize(email),
            first_name: None,
            last_name: None,
            password_hash: None,
            security_stamp: Uuid::new_v4().simple().to_string().to_uppercase(),
            concurrency_stamp: Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name;
        self.last_name = last_name;
        self
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .finish_non_exhaustive()
    }
}

/// A single failure reported by the identity service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityError {
    pub code: &'static str,
    pub description: String,
}

impl IdentityError {
    pub(crate) fn new(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub(crate) fn duplicate_user_name(user_name: &str) -> Self {
        Self::new(
            "DuplicateUserName",
            format!("Username '{user_name}' is already taken."),
        )
    }

    pub(crate) fn duplicate_email(email: &str) -> Self {
        Self::new("DuplicateEmail", format!("Email '{email}' is already taken."))
    }

    pub(crate) fn user_already_in_role(role: &str) -> Self {
        Self::new("UserAlreadyInRole", format!("User already in role '{role}'."))
    }
}

/// Outcome of a mutating identity operation.
///
/// Domain failures are values; `Err` on the surrounding `Result` is reserved
/// for infrastructure problems.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentityResult {
    Succeeded,
    Failed(Vec<IdentityError>),
}

impl IdentityResult {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    #[must_use]
    pub fn errors(&self) -> &[IdentityError] {
        match self {
            Self::Succeeded => &[],
            Self::Failed(errors) => errors,
        }
    }

    pub(crate) fn from_errors(errors: Vec<IdentityError>) -> Self {
        if errors.is_empty() {
            Self::Succeeded
        } else {
            Self::Failed(errors)
        }
    }
}

/// Result of a successful sign-in.
pub struct SessionTicket {
    /// Raw cookie value. Only its hash is kept by the store.
    pub token: SecretString,
    pub principal: ClaimsPrincipal,
    pub lifetime: Duration,
}

impl fmt::Debug for SessionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTicket")
            .field("token", &"***")
            .field("principal", &self.principal)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// Run the password policy, then the user format checks, then hash.
///
/// Returns the user with its hash set, or the failures to report. Password
/// failures short-circuit the user checks.
pub(crate) async fn prepare_new_user(
    policy: &PasswordPolicy,
    user: &User,
    password: &str,
) -> Result<std::result::Result<User, Vec<IdentityError>>> {
    let errors = policy.validate(password);
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    let errors = validators::validate_user(user);
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    let mut prepared = user.clone();
    prepared.password_hash = Some(password::hash(password).await?);
    Ok(Ok(prepared))
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Validate and persist `user` with a hash of `password`.
    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult>;

    /// Add `user` to the role named `role_name`. Fails with `Err` when the
    /// role does not exist.
    async fn add_user_to_role(&self, user: &User, role_name: &str) -> Result<IdentityResult>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn check_password(&self, user: &User, password: &str) -> Result<bool>;

    /// Issue a session for `principal`.
    async fn sign_in(&self, principal: ClaimsPrincipal) -> Result<SessionTicket>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Resolve a raw session token into its principal, ignoring expired sessions.
    async fn resolve(&self, token: &str) -> Result<Option<ClaimsPrincipal>>;

    async fn sign_out(&self, token: &str) -> Result<()>;
}
