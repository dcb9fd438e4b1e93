use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use super::account::{cookie::session_token, page, server_error, views, AccountState};

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Home page, greeting the signed-in user if any", content_type = "text/html", body = String)
    ),
    tag = "account"
)]
pub async fn home(state: Extension<Arc<AccountState>>, headers: HeaderMap) -> Response {
    let principal = match session_token(&headers) {
        Some(token) => match state.sessions.resolve(&token).await {
            Ok(principal) => principal,
            Err(err) => return server_error(&err),
        },
        None => None,
    };

    // Anonymous pages carry no form, so they leave the anti-forgery cookie alone.
    let Some(name) = principal.as_ref().and_then(|p| p.name().map(ToString::to_string)) else {
        return Html(views::render_home(None, "")).into_response();
    };
    page(&state.config, |token| views::render_home(Some(&name), token))
}
