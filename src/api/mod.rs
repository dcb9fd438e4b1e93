use crate::{
    api::handlers::{
        account::{login, logout, register, AccountConfig, AccountState},
        health, home,
    },
    db,
    identity::{password, postgres::PgIdentity},
};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::options,
    Extension, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    api_router()
}

/// Router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `OPTIONS /health`) are not documented.
fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(home::home))
        .routes(routes!(register::register_form, register::register))
        .routes(routes!(login::login_form, login::login))
        .routes(routes!(logout::logout));

    let mut account_tag = Tag::new("account");
    account_tag.description = Some("Registration, login and logout forms".to_string());
    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and database health".to_string());
    router.get_openapi_mut().tags = Some(vec![account_tag, health_tag]);

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

/// Assemble the application: documented routes, Swagger UI, request ids and
/// tracing, with the account state and pool as extensions.
pub fn app(state: Arc<AccountState>, pool: PgPool) -> Router {
    let (router, openapi) = router().split_for_parts();
    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state))
                .layer(Extension(pool)),
        )
}

/// Connect, migrate and serve until Ctrl-C.
///
/// # Errors
/// Returns an error if the database is unreachable, a migration fails or the
/// listener cannot bind.
pub async fn new(
    port: u16,
    dsn: &str,
    config: AccountConfig,
    skip_migrations: bool,
) -> Result<()> {
    let pool = db::connect(dsn).await?;

    if skip_migrations {
        info!("skipping database migrations");
    } else {
        db::migrate(&pool).await?;
    }

    password::warm_dummy_hash().await?;

    let identity = Arc::new(PgIdentity::new(
        pool.clone(),
        config.password_policy().clone(),
        config.session_ttl(),
    ));
    let state = Arc::new(AccountState::from_store(identity, config));

    let app = app(state, pool.clone());

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    pool.close().await;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_account_routes() {
        let spec = openapi();
        for path in ["/", "/health", "/Account/Register", "/Account/Login", "/Account/Logout"] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn parse_author_splits_name_and_email() {
        assert_eq!(
            parse_author("Team Membership <team@membership.dev>"),
            (Some("Team Membership"), Some("team@membership.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
    }

    #[test]
    fn cargo_license_uses_package_metadata() {
        let license = cargo_license();
        assert_eq!(
            license.and_then(|l| l.identifier),
            Some(env!("CARGO_PKG_LICENSE").to_string())
        );
    }
}
