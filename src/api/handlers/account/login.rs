use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap},
    response::Response,
    Form,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    antiforgery, bad_request,
    cookie::session_cookie,
    forms::{FormErrors, LoginForm, ReturnUrlQuery, INVALID_LOGIN},
    page,
    redirect::{found, local_target},
    server_error, views, AccountState,
};
use crate::identity::{password, ClaimsPrincipal};

#[utoipa::path(
    get,
    path = "/Account/Login",
    responses(
        (status = 200, description = "Empty login form", content_type = "text/html", body = String)
    ),
    tag = "account"
)]
pub async fn login_form(
    state: Extension<Arc<AccountState>>,
    Query(query): Query<ReturnUrlQuery>,
) -> Response {
    page(&state.config, |token| {
        views::render_login(
            "",
            query.return_url.as_deref(),
            &FormErrors::default(),
            token,
        )
    })
}

#[utoipa::path(
    post,
    path = "/Account/Login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "Signed in; redirected to a local returnUrl or home"),
        (status = 200, description = "Form re-rendered with an error", content_type = "text/html", body = String),
        (status = 400, description = "Anti-forgery token missing or mismatched")
    ),
    tag = "account"
)]
pub async fn login(
    state: Extension<Arc<AccountState>>,
    Query(query): Query<ReturnUrlQuery>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if !antiforgery::validate(&headers, &form.verification_token) {
        return bad_request();
    }

    let return_url = query.return_url.or_else(|| form.return_url.clone());

    let errors = form.validate();
    if !errors.is_valid() {
        return page(&state.config, |token| {
            views::render_login(&form.email, return_url.as_deref(), &errors, token)
        });
    }

    let user = match state.identity.find_user_by_email(&form.email).await {
        Ok(user) => user,
        Err(err) => return server_error(&err),
    };

    // Unknown users still pay for one hash verification.
    let verified = match &user {
        Some(user) => state.identity.check_password(user, &form.password).await,
        None => password::verify_unknown(&form.password).await,
    };

    let user = match (user, verified) {
        (Some(user), Ok(true)) => user,
        (_, Err(err)) => return server_error(&err),
        _ => {
            debug!("login rejected");
            let mut errors = FormErrors::default();
            errors.add_form(INVALID_LOGIN);
            return page(&state.config, |token| {
                views::render_login("", return_url.as_deref(), &errors, token)
            });
        }
    };

    let ticket = match state.identity.sign_in(ClaimsPrincipal::for_user(&user)).await {
        Ok(ticket) => ticket,
        Err(err) => return server_error(&err),
    };

    let max_age = form.remember_me().then_some(ticket.lifetime);
    let cookie = match session_cookie(&state.config, ticket.token.expose_secret(), max_age) {
        Ok(cookie) => cookie,
        Err(err) => return server_error(&anyhow::Error::from(err)),
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);

    info!("user {} signed in", user.id);
    found(&local_target(return_url.as_deref()), response_headers)
}
