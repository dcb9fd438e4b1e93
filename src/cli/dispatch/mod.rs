//! Map validated CLI matches to an [`Action`].

use crate::cli::{
    actions::{migrate, server, Action},
    commands::{account, migrate::Direction, migrate::SUBCOMMAND as MIGRATE, ARG_DSN, ARG_PORT},
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(MIGRATE) {
        return Ok(Action::Migrate(migrate::Args {
            dsn: dsn(sub)?,
            direction: Direction::parse(sub),
        }));
    }

    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let account = account::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port,
        dsn: dsn(matches)?,
        session_ttl_seconds: account.session_ttl_seconds,
        cookie_secure: account.cookie_secure,
        password_min_length: account.password_min_length,
        skip_migrations: account.skip_migrations,
    }))
}

fn dsn(matches: &clap::ArgMatches) -> Result<String> {
    matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty())
        .context("missing required argument: --dsn")
}
