use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::Response,
    Form,
};
use std::sync::Arc;
use tracing::error;

use super::{
    antiforgery, bad_request,
    cookie::{clear_session_cookie, session_token},
    forms::LogoutForm,
    redirect::{found, HOME},
    AccountState,
};

#[utoipa::path(
    post,
    path = "/Account/Logout",
    request_body(content = LogoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Session revoked and cookie cleared"),
        (status = 400, description = "Anti-forgery token missing or mismatched")
    ),
    tag = "account"
)]
pub async fn logout(
    state: Extension<Arc<AccountState>>,
    headers: HeaderMap,
    Form(form): Form<LogoutForm>,
) -> Response {
    if !antiforgery::validate(&headers, &form.verification_token) {
        return bad_request();
    }

    if let Some(token) = session_token(&headers) {
        if let Err(err) = state.sessions.sign_out(&token).await {
            error!("Failed to delete session: {err:#}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(&state.config) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    found(HOME, response_headers)
}
