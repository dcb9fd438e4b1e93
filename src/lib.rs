//! # Membership (account registration and cookie sign-in)
//!
//! `membership` serves a small account flow over HTML forms:
//!
//! - `GET/POST /Account/Register` creates a user through the identity service
//!   and adds it to the `Visitor` role.
//! - `GET/POST /Account/Login` verifies a password and issues a session
//!   cookie, then redirects to a local `returnUrl`.
//! - `POST /Account/Logout` revokes the session.
//!
//! ## Identity boundary
//!
//! Handlers only orchestrate. Password hashing (argon2), user persistence and
//! role membership sit behind [`identity::IdentityService`]; session lookup
//! sits behind [`identity::SessionStore`]. The Postgres implementation relies
//! on unique indexes for concurrency control.
//!
//! ## Migrations
//!
//! The schema and the two fixed roles (`Visitor`, `Administrator`) are
//! reversible sqlx migrations embedded in the binary. They run at startup
//! unless `--skip-migrations` is given, and can be applied or reverted with
//! the `migrate` subcommand.

pub mod api;
pub mod cli;
pub mod db;
pub mod identity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
