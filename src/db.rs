//! Database pool and schema migrations.
//!
//! Migrations live in `migrations/` as reversible `*.up.sql` / `*.down.sql`
//! pairs and are embedded at compile time. The runner records applied
//! versions in `_sqlx_migrations` and wraps each script in a transaction.

use anyhow::{Context, Result};
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::{info, info_span, Instrument};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Version of the migration creating users, roles, memberships and sessions.
pub const SCHEMA_VERSION: i64 = 20_230_111_000_000;

/// Version of the migration seeding the `Visitor` and `Administrator` roles.
pub const ROLE_SEED_VERSION: i64 = 20_230_111_212_209;

pub const ROLE_SEED_UP_SQL: &str =
    include_str!("../migrations/20230111212209_insert_2_roles.up.sql");
pub const ROLE_SEED_DOWN_SQL: &str =
    include_str!("../migrations/20230111212209_insert_2_roles.down.sql");

/// Connect to Postgres.
///
/// # Errors
/// Returns an error if the pool cannot establish its first connection.
pub async fn connect(dsn: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")
}

/// Apply every pending migration.
///
/// # Errors
/// Returns an error if any migration fails; the failing one is rolled back.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;
    info!("database migrations applied");
    Ok(())
}

/// Revert applied migrations newer than `target`.
///
/// # Errors
/// Returns an error if a down script fails.
pub async fn revert_to(pool: &PgPool, target: i64) -> Result<()> {
    MIGRATOR
        .undo(pool, target)
        .await
        .with_context(|| format!("Failed to revert migrations down to {target}"))?;
    info!("database migrations reverted down to {target}");
    Ok(())
}

/// Revert only the most recently applied migration.
///
/// # Errors
/// Returns an error if the bookkeeping table cannot be read or the down
/// script fails.
pub async fn revert_last(pool: &PgPool) -> Result<()> {
    let query = r"
        SELECT version
        FROM _sqlx_migrations
        WHERE success
        ORDER BY version DESC
        LIMIT 1 OFFSET 1
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let target: i64 = sqlx::query(query)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("Failed to read applied migrations")?
        .map_or(0, |row| row.get("version"));

    revert_to(pool, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::migrate::MigrationType;

    #[test]
    fn migrations_are_ordered_and_reversible() {
        let versions: Vec<i64> = MIGRATOR
            .iter()
            .filter(|m| matches!(m.migration_type, MigrationType::ReversibleUp))
            .map(|m| m.version)
            .collect();
        assert_eq!(versions, vec![SCHEMA_VERSION, ROLE_SEED_VERSION]);

        let downs = MIGRATOR
            .iter()
            .filter(|m| matches!(m.migration_type, MigrationType::ReversibleDown))
            .count();
        assert_eq!(downs, 2);
    }

    #[test]
    fn role_seed_is_the_embedded_script() {
        let up = MIGRATOR.iter().find(|m| {
            m.version == ROLE_SEED_VERSION && matches!(m.migration_type, MigrationType::ReversibleUp)
        });
        assert_eq!(
            up.map(|m| m.sql.trim().to_string()),
            Some(ROLE_SEED_UP_SQL.trim().to_string())
        );
    }

    #[test]
    fn role_seed_down_removes_administrator_first() {
        let admin = ROLE_SEED_DOWN_SQL.find("2ff4eebe-34fe-4ec6-8b85-07534ad8c430");
        let visitor = ROLE_SEED_DOWN_SQL.find("5149875c-c951-4af8-a955-7fd4613407fb");
        assert!(admin.is_some());
        assert!(admin < visitor);
    }

    #[test]
    fn schema_has_unique_lookup_keys() {
        let schema = MIGRATOR
            .iter()
            .find(|m| {
                m.version == SCHEMA_VERSION && matches!(m.migration_type, MigrationType::ReversibleUp)
            })
            .map(|m| m.sql.to_string())
            .unwrap_or_default();
        for index in [
            "users_normalized_user_name_key",
            "users_normalized_email_key",
            "roles_normalized_name_key",
        ] {
            assert!(schema.contains(index), "missing {index}");
        }
    }
}
