//! Account flow settings: sessions, cookies and password policy.

use clap::{builder::BoolishValueParser, Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_PASSWORD_MIN_LENGTH: &str = "password-min-length";
pub const ARG_SKIP_MIGRATIONS: &str = "skip-migrations";

#[derive(Debug, Clone)]
pub struct Options {
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub password_min_length: usize,
    pub skip_migrations: bool,
}

impl Options {
    /// Parse account arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_ttl_seconds = matches
            .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_SESSION_TTL_SECONDS}"))?;
        let password_min_length = matches
            .get_one::<u16>(ARG_PASSWORD_MIN_LENGTH)
            .copied()
            .map(usize::from)
            .ok_or_else(|| anyhow::anyhow!("missing argument: --{ARG_PASSWORD_MIN_LENGTH}"))?;

        Ok(Self {
            session_ttl_seconds,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            password_min_length,
            skip_migrations: matches.get_flag(ARG_SKIP_MIGRATIONS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("MEMBERSHIP_SESSION_TTL_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark session and anti-forgery cookies as Secure (HTTPS only)")
                .env("MEMBERSHIP_COOKIE_SECURE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_PASSWORD_MIN_LENGTH)
                .long(ARG_PASSWORD_MIN_LENGTH)
                .help("Minimum password length")
                .env("MEMBERSHIP_PASSWORD_MIN_LENGTH")
                .default_value("6")
                .value_parser(clap::value_parser!(u16).range(1..=256)),
        )
        .arg(
            Arg::new(ARG_SKIP_MIGRATIONS)
                .long(ARG_SKIP_MIGRATIONS)
                .help("Do not apply pending migrations on startup")
                .env("MEMBERSHIP_SKIP_MIGRATIONS")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
}
