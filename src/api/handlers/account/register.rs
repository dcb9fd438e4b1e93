use axum::{extract::Extension, http::HeaderMap, response::Response, Form};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    antiforgery, bad_request,
    forms::{FormErrors, RegisterForm},
    page,
    redirect::{found, HOME},
    server_error, views, AccountState,
};
use crate::identity::{roles::VISITOR, IdentityResult};

#[utoipa::path(
    get,
    path = "/Account/Register",
    responses(
        (status = 200, description = "Empty registration form", content_type = "text/html", body = String)
    ),
    tag = "account"
)]
pub async fn register_form(state: Extension<Arc<AccountState>>) -> Response {
    page(&state.config, |token| {
        views::render_register(None, &FormErrors::default(), token)
    })
}

#[utoipa::path(
    post,
    path = "/Account/Register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 302, description = "User created and added to the Visitor role"),
        (status = 200, description = "Form re-rendered with validation errors", content_type = "text/html", body = String),
        (status = 400, description = "Anti-forgery token missing or mismatched")
    ),
    tag = "account"
)]
pub async fn register(
    state: Extension<Arc<AccountState>>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    if !antiforgery::validate(&headers, &form.verification_token) {
        return bad_request();
    }

    let errors = form.validate();
    if !errors.is_valid() {
        return page(&state.config, |token| {
            views::render_register(Some(&form), &errors, token)
        });
    }

    let user = form.to_user();
    match state.identity.create_user(&user, &form.password).await {
        Ok(IdentityResult::Succeeded) => {}
        Ok(IdentityResult::Failed(failures)) => {
            let mut errors = FormErrors::default();
            for failure in failures {
                debug!("registration rejected: {}", failure.code);
                errors.add_form(failure.description);
            }
            return page(&state.config, |token| {
                views::render_register(Some(&form), &errors, token)
            });
        }
        Err(err) => return server_error(&err),
    }

    match state.identity.add_user_to_role(&user, VISITOR).await {
        Ok(IdentityResult::Succeeded) => {}
        Ok(IdentityResult::Failed(failures)) => {
            warn!("user {} not added to {VISITOR}: {:?}", user.id, failures);
        }
        Err(err) => return server_error(&err),
    }

    info!("registered user {}", user.id);
    found(HOME, HeaderMap::new())
}
