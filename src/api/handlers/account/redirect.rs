//! Redirect helpers, including the open-redirect guard used after login.

use axum::{
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const HOME: &str = "/";

/// `true` when `url` stays on this application: `/path` or `~/path`, but not
/// `//host`, `/\host`, absolute URLs or anything with control characters.
#[must_use]
pub fn is_local_url(url: &str) -> bool {
    let rest = if let Some(rest) = url.strip_prefix("~/") {
        rest
    } else if let Some(rest) = url.strip_prefix('/') {
        rest
    } else {
        return false;
    };

    if rest.starts_with('/') || rest.starts_with('\\') {
        return false;
    }
    !rest.chars().any(char::is_control)
}

/// Resolve the post-login destination. Anything not local becomes [`HOME`].
#[must_use]
pub fn local_target(return_url: Option<&str>) -> String {
    match return_url {
        Some(url) if is_local_url(url) => match url.strip_prefix('~') {
            Some(app_relative) => app_relative.to_string(),
            None => url.to_string(),
        },
        _ => HOME.to_string(),
    }
}

/// `302 Found` to `location`, with any extra headers (cookies) attached.
pub(super) fn found(location: &str, mut headers: HeaderMap) -> Response {
    let location =
        HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static(HOME));
    headers.insert(LOCATION, location);
    (StatusCode::FOUND, headers).into_response()
}
