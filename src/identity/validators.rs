//! Format checks shared by every identity store.
//!
//! Uniqueness is checked by the stores themselves since only they can see
//! existing records.

use regex::Regex;
use std::sync::OnceLock;

use super::{IdentityError, User};

const ALLOWED_USER_NAME_CHARACTERS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._@+";

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

/// Basic `local@domain.tld` check.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

#[must_use]
pub fn valid_user_name(user_name: &str) -> bool {
    !user_name.is_empty()
        && user_name
            .chars()
            .all(|c| ALLOWED_USER_NAME_CHARACTERS.contains(c))
}

/// User-level format errors (name characters, email shape).
#[must_use]
pub fn validate_user(user: &User) -> Vec<IdentityError> {
    let mut errors = Vec::new();
    if !valid_user_name(&user.user_name) {
        errors.push(IdentityError::new(
            "InvalidUserName",
            format!(
                "Username '{}' is invalid, can only contain letters or digits.",
                user.user_name
            ),
        ));
    }
    if !valid_email(&user.email) {
        errors.push(IdentityError::new(
            "InvalidEmail",
            format!("Email '{}' is invalid.", user.email),
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("white space@example.com"));
    }

    #[test]
    fn email_pattern_is_compiled_once() {
        let first = email_pattern();
        assert!(first.is_some());
        assert!(valid_email("a@example.com"));
        let second = email_pattern();
        assert!(matches!((first, second), (Some(a), Some(b)) if std::ptr::eq(a, b)));
    }

    #[test]
    fn user_name_allows_email_characters() {
        assert!(valid_user_name("first.last+tag@example.com"));
        assert!(!valid_user_name("bad name"));
        assert!(!valid_user_name(""));
    }

    #[test]
    fn validate_user_collects_both_errors() {
        let user = User::new("bad name", "nope");
        let codes: Vec<_> = validate_user(&user).iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["InvalidUserName", "InvalidEmail"]);
    }
}
