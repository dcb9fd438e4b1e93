use crate::{api, api::handlers::account::AccountConfig, identity::PasswordPolicy};
use anyhow::Result;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,
    pub password_min_length: usize,
    pub skip_migrations: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, migrations fail, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    api::new(
        args.port,
        &args.dsn,
        account_config(&args),
        args.skip_migrations,
    )
    .await
}

fn account_config(args: &Args) -> AccountConfig {
    AccountConfig::new()
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_cookie_secure(args.cookie_secure)
        .with_password_policy(PasswordPolicy::default().with_min_length(args.password_min_length))
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        ("cookie_secure", args.cookie_secure.to_string()),
        ("password_min_length", args.password_min_length.to_string()),
        ("migrations", (!args.skip_migrations).to_string()),
    ];
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
