//! Postgres-backed identity store over the migrated schema.
//!
//! Uniqueness of user names, emails and role memberships is enforced by
//! unique indexes; a pre-check gives friendly errors in the common case and
//! the index catches concurrent registrations.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use std::time::Duration;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use super::{
    normalize, password, prepare_new_user,
    session::{generate_session_token, hash_session_token},
    Claim, ClaimsPrincipal, IdentityError, IdentityResult, IdentityService, PasswordPolicy,
    SessionStore, SessionTicket, User,
};

const USER_NAME_INDEX: &str = "users_normalized_user_name_key";
const USER_EMAIL_INDEX: &str = "users_normalized_email_key";

#[derive(Clone, Debug)]
pub struct PgIdentity {
    pool: PgPool,
    policy: PasswordPolicy,
    session_ttl: Duration,
}

impl PgIdentity {
    #[must_use]
    pub fn new(pool: PgPool, policy: PasswordPolicy, session_ttl: Duration) -> Self {
        Self {
            pool,
            policy,
            session_ttl,
        }
    }

    async fn duplicate_errors(&self, user: &User) -> Result<Vec<IdentityError>> {
        let query = r"
            SELECT
                EXISTS(SELECT 1 FROM users WHERE normalized_user_name = $1) AS name_taken,
                EXISTS(SELECT 1 FROM users WHERE normalized_email = $2) AS email_taken
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&user.normalized_user_name)
            .bind(&user.normalized_email)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to check for existing user")?;

        let mut errors = Vec::new();
        if row.get::<bool, _>("name_taken") {
            errors.push(IdentityError::duplicate_user_name(&user.user_name));
        }
        if row.get::<bool, _>("email_taken") {
            errors.push(IdentityError::duplicate_email(&user.email));
        }
        Ok(errors)
    }
}

#[async_trait]
impl IdentityService for PgIdentity {
    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult> {
        let prepared = match prepare_new_user(&self.policy, user, password).await? {
            Ok(prepared) => prepared,
            Err(errors) => return Ok(IdentityResult::Failed(errors)),
        };

        let errors = self.duplicate_errors(&prepared).await?;
        if !errors.is_empty() {
            return Ok(IdentityResult::Failed(errors));
        }

        let query = r"
            INSERT INTO users
                (id, user_name, normalized_user_name, email, normalized_email,
                 first_name, last_name, password_hash, security_stamp, concurrency_stamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(prepared.id)
            .bind(&prepared.user_name)
            .bind(&prepared.normalized_user_name)
            .bind(&prepared.email)
            .bind(&prepared.normalized_email)
            .bind(&prepared.first_name)
            .bind(&prepared.last_name)
            .bind(&prepared.password_hash)
            .bind(&prepared.security_stamp)
            .bind(&prepared.concurrency_stamp)
            .execute(&self.pool)
            .instrument(span)
            .await;

        match inserted {
            Ok(_) => {
                debug!("created user {}", prepared.id);
                Ok(IdentityResult::Succeeded)
            }
            // Lost a race against a concurrent registration.
            Err(err) => match unique_violation_constraint(&err) {
                Some(USER_NAME_INDEX) => Ok(IdentityResult::Failed(vec![
                    IdentityError::duplicate_user_name(&prepared.user_name),
                ])),
                Some(USER_EMAIL_INDEX) => Ok(IdentityResult::Failed(vec![
                    IdentityError::duplicate_email(&prepared.email),
                ])),
                _ => Err(err).context("failed to insert user"),
            },
        }
    }

    async fn add_user_to_role(&self, user: &User, role_name: &str) -> Result<IdentityResult> {
        let normalized = normalize(role_name);
        let query = "SELECT id FROM roles WHERE normalized_name = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let role_id: Uuid = sqlx::query(query)
            .bind(&normalized)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup role")?
            .map(|row| row.get("id"))
            .ok_or_else(|| anyhow!("Role {normalized} does not exist"))?;

        let query = "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        match sqlx::query(query)
            .bind(user.id)
            .bind(role_id)
            .execute(&self.pool)
            .instrument(span)
            .await
        {
            Ok(_) => Ok(IdentityResult::Succeeded),
            Err(err) if unique_violation_constraint(&err).is_some() => Ok(IdentityResult::Failed(
                vec![IdentityError::user_already_in_role(role_name)],
            )),
            Err(err) => Err(err).context("failed to add user to role"),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = r"
            SELECT id, user_name, normalized_user_name, email, normalized_email,
                   first_name, last_name, password_hash, security_stamp, concurrency_stamp
            FROM users
            WHERE normalized_email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(normalize(email))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by email")?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool> {
        match &user.password_hash {
            Some(hash) => password::verify(password, hash).await,
            None => password::verify_unknown(password).await,
        }
    }

    async fn sign_in(&self, principal: ClaimsPrincipal) -> Result<SessionTicket> {
        let user_id = principal
            .user_id()
            .ok_or_else(|| anyhow!("principal has no user identifier claim"))?;
        let token = generate_session_token()?;
        let ttl_seconds = i64::try_from(self.session_ttl.as_secs()).unwrap_or(i64::MAX);

        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to purge expired sessions")?;

        let query = r"
            INSERT INTO sessions (token_hash, user_id, scheme, claims, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_session_token(&token))
            .bind(user_id)
            .bind(&principal.scheme)
            .bind(Json(&principal.claims))
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;

        Ok(SessionTicket {
            token: SecretString::from(token),
            principal,
            lifetime: self.session_ttl,
        })
    }
}

#[async_trait]
impl SessionStore for PgIdentity {
    async fn resolve(&self, token: &str) -> Result<Option<ClaimsPrincipal>> {
        let query = r"
            SELECT scheme, claims
            FROM sessions
            WHERE token_hash = $1
              AND expires_at > NOW()
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(hash_session_token(token))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(claims): Json<Vec<Claim>> = row
            .try_get("claims")
            .context("failed to decode session claims")?;
        Ok(Some(ClaimsPrincipal {
            scheme: row.get("scheme"),
            claims,
        }))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(hash_session_token(token))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        user_name: row.get("user_name"),
        normalized_user_name: row.get("normalized_user_name"),
        email: row.get("email"),
        normalized_email: row.get("normalized_email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        security_stamp: row.get("security_stamp"),
        concurrency_stamp: row.get("concurrency_stamp"),
    }
}

/// Name of the violated constraint when `err` is a `23505` unique violation.
pub(crate) fn unique_violation_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().is_some_and(|code| code.as_ref() == "23505") =>
        {
            Some(db_err.constraint().unwrap_or_default())
        }
        _ => None,
    }
}
