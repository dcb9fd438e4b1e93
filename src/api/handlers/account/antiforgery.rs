//! Double-submit anti-forgery tokens.
//!
//! Every rendered form carries a fresh token in a hidden field and the same
//! value in a `SameSite=Strict` cookie. A POST is accepted only when both are
//! present and equal.

use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::{cookie::read_cookie, AccountConfig};

pub const FIELD_NAME: &str = "__RequestVerificationToken";
pub const COOKIE_NAME: &str = "membership_antiforgery";

/// A freshly issued token pair: the field value and its cookie.
pub(super) struct Issued {
    pub token: String,
    pub headers: HeaderMap,
}

pub(super) fn issue(config: &AccountConfig) -> Result<Issued> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate anti-forgery token")?;
    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        cookie(config, &token).context("invalid anti-forgery cookie")?,
    );
    Ok(Issued { token, headers })
}

fn cookie(config: &AccountConfig, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Strict");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Check the submitted field against the cookie.
pub(super) fn validate(headers: &HeaderMap, submitted: &str) -> bool {
    let Some(expected) = read_cookie(headers, COOKIE_NAME) else {
        return false;
    };
    if submitted.is_empty() {
        return false;
    }
    // Compare digests so the comparison time does not depend on the prefix.
    Sha256::digest(expected.as_bytes()) == Sha256::digest(submitted.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(COOKIE, value);
        }
        headers
    }

    #[test]
    fn issued_cookie_matches_token() {
        let issued = issue(&AccountConfig::new()).ok();
        assert!(issued.is_some());
        if let Some(issued) = issued {
            let cookie = issued
                .headers
                .get(SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            assert!(cookie.starts_with(&format!("{COOKIE_NAME}={};", issued.token)));
            assert!(cookie.contains("SameSite=Strict"));
            assert!(cookie.contains("HttpOnly"));
        }
    }

    #[test]
    fn tokens_are_fresh() {
        let config = AccountConfig::new();
        let first = issue(&config).ok().map(|i| i.token);
        let second = issue(&config).ok().map(|i| i.token);
        assert!(first.is_some());
        assert_ne!(first, second);
    }

    #[test]
    fn validate_requires_matching_pair() {
        let headers = with_cookie("membership_antiforgery=abc");
        assert!(validate(&headers, "abc"));
        assert!(!validate(&headers, "abd"));
        assert!(!validate(&headers, ""));
        assert!(!validate(&HeaderMap::new(), "abc"));
    }
}
