//! Account flow: registration, login and logout over HTML forms.
//!
//! Handlers validate input, check the anti-forgery pair and delegate
//! everything credential-related to [`IdentityService`].

pub mod antiforgery;
pub mod cookie;
pub mod forms;
pub mod login;
pub mod logout;
pub mod redirect;
pub mod register;
pub mod views;


use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::{sync::Arc, time::Duration};
use tracing::error;

use crate::identity::{IdentityService, PasswordPolicy, SessionStore};

const DEFAULT_SESSION_TTL_SECONDS: u64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AccountConfig {
    session_ttl_seconds: u64,
    cookie_secure: bool,
    password_policy: PasswordPolicy,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cookie_secure: false,
            password_policy: PasswordPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.password_policy
    }
}

/// Shared, immutable state handed to every account handler.
pub struct AccountState {
    pub identity: Arc<dyn IdentityService>,
    pub sessions: Arc<dyn SessionStore>,
    pub config: AccountConfig,
}

impl AccountState {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityService>,
        sessions: Arc<dyn SessionStore>,
        config: AccountConfig,
    ) -> Self {
        Self {
            identity,
            sessions,
            config,
        }
    }

    /// State backed by one store implementing both boundaries.
    #[must_use]
    pub fn from_store<S>(store: Arc<S>, config: AccountConfig) -> Self
    where
        S: IdentityService + SessionStore + 'static,
    {
        Self::new(store.clone(), store, config)
    }
}

/// Render a form page with a fresh anti-forgery token.
pub(crate) fn page(config: &AccountConfig, render: impl FnOnce(&str) -> String) -> Response {
    match antiforgery::issue(config) {
        Ok(issued) => (StatusCode::OK, issued.headers, Html(render(&issued.token))).into_response(),
        Err(err) => server_error(&err),
    }
}

pub(crate) fn server_error(err: &anyhow::Error) -> Response {
    error!("{err:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

pub(crate) fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        "The anti-forgery token could not be validated.",
    )
        .into_response()
}
