//! In-memory identity store.
//!
//! All state lives behind one `RwLock`, so uniqueness checks and inserts are
//! atomic with respect to each other. Nothing survives a restart.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use secrecy::SecretString;
use std::{
    collections::{HashMap, HashSet},
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    normalize, password, prepare_new_user,
    roles::{Role, SEED_ROLES},
    session::{generate_session_token, hash_session_token},
    ClaimsPrincipal, IdentityError, IdentityResult, IdentityService, PasswordPolicy,
    SessionStore, SessionTicket, User,
};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

struct SessionEntry {
    principal: ClaimsPrincipal,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    roles: Vec<Role>,
    user_roles: HashSet<(Uuid, Uuid)>,
    sessions: HashMap<Vec<u8>, SessionEntry>,
}

pub struct MemoryIdentity {
    inner: RwLock<Inner>,
    policy: PasswordPolicy,
    session_ttl: Duration,
}

impl MemoryIdentity {
    /// Empty store with the seeded roles already present.
    #[must_use]
    pub fn new() -> Self {
        let roles = SEED_ROLES.iter().map(|seed| seed.to_role()).collect();
        Self {
            inner: RwLock::new(Inner {
                roles,
                ..Inner::default()
            }),
            policy: PasswordPolicy::default(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Empty store with no roles at all.
    #[must_use]
    pub fn without_roles() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            policy: PasswordPolicy::default(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Role names held by `user_id`, sorted.
    pub async fn roles_of(&self, user_id: Uuid) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner
            .roles
            .iter()
            .filter(|role| inner.user_roles.contains(&(user_id, role.id)))
            .map(|role| role.name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityService for MemoryIdentity {
    async fn create_user(&self, user: &User, password: &str) -> Result<IdentityResult> {
        let prepared = match prepare_new_user(&self.policy, user, password).await? {
            Ok(prepared) => prepared,
            Err(errors) => return Ok(IdentityResult::Failed(errors)),
        };

        let mut inner = self.inner.write().await;
        let mut errors = Vec::new();
        if inner
            .users
            .values()
            .any(|existing| existing.normalized_user_name == prepared.normalized_user_name)
        {
            errors.push(IdentityError::duplicate_user_name(&prepared.user_name));
        }
        if inner
            .users
            .values()
            .any(|existing| existing.normalized_email == prepared.normalized_email)
        {
            errors.push(IdentityError::duplicate_email(&prepared.email));
        }
        if !errors.is_empty() {
            return Ok(IdentityResult::Failed(errors));
        }

        debug!("created user {}", prepared.id);
        inner.users.insert(prepared.id, prepared);
        Ok(IdentityResult::Succeeded)
    }

    async fn add_user_to_role(&self, user: &User, role_name: &str) -> Result<IdentityResult> {
        let normalized = normalize(role_name);
        let mut inner = self.inner.write().await;
        let role_id = inner
            .roles
            .iter()
            .find(|role| role.normalized_name == normalized)
            .map(|role| role.id)
            .ok_or_else(|| anyhow!("Role {normalized} does not exist"))?;

        if !inner.users.contains_key(&user.id) {
            return Err(anyhow!("User {} does not exist", user.id));
        }

        if inner.user_roles.insert((user.id, role_id)) {
            Ok(IdentityResult::Succeeded)
        } else {
            Ok(IdentityResult::Failed(vec![
                IdentityError::user_already_in_role(role_name),
            ]))
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let normalized = normalize(email);
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.normalized_email == normalized)
            .cloned())
    }

    async fn check_password(&self, user: &User, password: &str) -> Result<bool> {
        match &user.password_hash {
            Some(hash) => password::verify(password, hash).await,
            None => password::verify_unknown(password).await,
        }
    }

    async fn sign_in(&self, principal: ClaimsPrincipal) -> Result<SessionTicket> {
        let token = generate_session_token()?;
        let now = Instant::now();
        let entry = SessionEntry {
            principal: principal.clone(),
            expires_at: now + self.session_ttl,
        };

        let mut inner = self.inner.write().await;
        inner.sessions.retain(|_, existing| existing.expires_at > now);
        inner.sessions.insert(hash_session_token(&token), entry);
        drop(inner);

        Ok(SessionTicket {
            token: SecretString::from(token),
            principal,
            lifetime: self.session_ttl,
        })
    }
}

#[async_trait]
impl SessionStore for MemoryIdentity {
    async fn resolve(&self, token: &str) -> Result<Option<ClaimsPrincipal>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(&hash_session_token(token))
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.principal.clone()))
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        self.inner
            .write()
            .await
            .sessions
            .remove(&hash_session_token(token));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::roles::{ADMINISTRATOR, VISITOR};
    use secrecy::ExposeSecret;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    const PASSWORD: &str = "Str0ng!pass";

    fn store() -> MemoryIdentity {
        MemoryIdentity::new()
    }

    async fn created(store: &MemoryIdentity, email: &str) -> User {
        let user = User::new(email, email);
        let result = store.create_user(&user, PASSWORD).await.ok();
        assert_eq!(result, Some(IdentityResult::Succeeded));
        user
    }

    #[tokio::test]
    async fn create_then_find_by_email_case_insensitive() {
        let store = store();
        let user = created(&store, "Alice@Example.com").await;

        let found = store.find_user_by_email("alice@example.COM").await.ok().flatten();
        assert_eq!(found.as_ref().map(|u| u.id), Some(user.id));
        assert!(found.and_then(|u| u.password_hash).is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_reports_name_and_email() {
        let store = store();
        created(&store, "bob@example.com").await;

        let again = User::new("BOB@example.com", "BOB@example.com");
        let result = store.create_user(&again, PASSWORD).await.ok();
        let codes: Vec<_> = result
            .as_ref()
            .map(|r| r.errors().iter().map(|e| e.code).collect())
            .unwrap_or_default();
        assert_eq!(codes, vec!["DuplicateUserName", "DuplicateEmail"]);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn weak_password_skips_user_checks() {
        let store = store();
        let user = User::new("bad name", "bad name");
        let result = store.create_user(&user, "weak").await.ok();
        let codes: Vec<_> = result
            .as_ref()
            .map(|r| r.errors().iter().map(|e| e.code).collect())
            .unwrap_or_default();
        assert!(codes.contains(&"PasswordTooShort"));
        assert!(!codes.contains(&"InvalidUserName"));
        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn check_password_matches_only_the_right_one() {
        let store = store();
        let user = created(&store, "carol@example.com").await;
        let stored = store
            .find_user_by_email("carol@example.com")
            .await
            .ok()
            .flatten();
        assert!(stored.is_some());
        if let Some(stored) = stored {
            assert!(matches!(store.check_password(&stored, PASSWORD).await, Ok(true)));
            assert!(matches!(store.check_password(&stored, "nope").await, Ok(false)));
        }
        // The transient user carries no hash and never matches.
        assert!(matches!(store.check_password(&user, PASSWORD).await, Ok(false)));
    }

    #[tokio::test]
    async fn add_to_role_once() {
        let store = store();
        let user = created(&store, "dave@example.com").await;

        let first = store.add_user_to_role(&user, VISITOR).await.ok();
        assert_eq!(first, Some(IdentityResult::Succeeded));
        let second = store.add_user_to_role(&user, "visitor").await.ok();
        assert_eq!(
            second.map(|r| r.errors().iter().map(|e| e.code).collect::<Vec<_>>()),
            Some(vec!["UserAlreadyInRole"])
        );
        assert!(store.add_user_to_role(&user, ADMINISTRATOR).await.is_ok());
        assert_eq!(
            store.roles_of(user.id).await,
            vec![ADMINISTRATOR.to_string(), VISITOR.to_string()]
        );
    }

    #[tokio::test]
    async fn add_to_missing_role_is_an_error() {
        let store = MemoryIdentity::without_roles();
        let user = created(&store, "erin@example.com").await;
        assert!(store.add_user_to_role(&user, VISITOR).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_registrations_with_same_email_create_one_user() {
        let store = Arc::new(store());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let user = User::new("race@example.com", "race@example.com");
                store.create_user(&user, PASSWORD).await.ok()
            }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if let Ok(Some(result)) = handle.await {
                if result.succeeded() {
                    succeeded += 1;
                }
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn sign_in_resolve_sign_out() {
        let store = store();
        let user = created(&store, "frank@example.com").await;
        let principal = ClaimsPrincipal::for_user(&user);

        let ticket = store.sign_in(principal.clone()).await;
        assert!(ticket.is_ok());
        if let Ok(ticket) = ticket {
            let token = ticket.token.expose_secret().to_string();
            let resolved = store.resolve(&token).await.ok().flatten();
            assert_eq!(resolved, Some(principal));

            assert!(store.sign_out(&token).await.is_ok());
            assert_eq!(store.resolve(&token).await.ok().flatten(), None);
        }
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = store().with_session_ttl(Duration::ZERO);
        let user = created(&store, "gina@example.com").await;
        let ticket = store.sign_in(ClaimsPrincipal::for_user(&user)).await;
        assert!(ticket.is_ok());
        if let Ok(ticket) = ticket {
            let resolved = store.resolve(ticket.token.expose_secret()).await.ok().flatten();
            assert_eq!(resolved, None);
        }
    }

    #[tokio::test]
    async fn sign_in_drops_expired_sessions() -> anyhow::Result<()> {
        let store = store().with_session_ttl(Duration::ZERO);
        let user = created(&store, "hana@example.com").await;
        for _ in 0..50 {
            store.sign_in(ClaimsPrincipal::for_user(&user)).await?;
        }
        assert_eq!(store.session_count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_keeps_live_sessions() -> anyhow::Result<()> {
        let store = store();
        let user = created(&store, "ivan@example.com").await;
        for _ in 0..3 {
            store.sign_in(ClaimsPrincipal::for_user(&user)).await?;
        }
        assert_eq!(store.session_count().await, 3);
        Ok(())
    }

    #[tokio::test(flavor = "current_thread")]
    async fn create_user_does_not_stall_other_tasks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        tokio::task::yield_now().await;

        let store = store();
        created(&store, "jade@example.com").await;
        ticker.abort();

        assert!(ticks.load(Ordering::Relaxed) > 0);
    }
}
