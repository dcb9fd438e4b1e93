use anyhow::{ensure, Context, Result};
use membership::{db, identity::roles::SEED_ROLES};
use sqlx::{PgPool, Row};
use test_support::{postgres::PostgresContainer, runtime};

async fn role_rows(pool: &PgPool) -> Result<Vec<(String, String, String, String)>> {
    let rows = sqlx::query(
        "SELECT id::text AS id, concurrency_stamp, name, normalized_name FROM roles ORDER BY name DESC",
    )
    .fetch_all(pool)
    .await
    .context("Failed to read roles")?;
    Ok(rows
        .iter()
        .map(|row| {
            (
                row.get("id"),
                row.get("concurrency_stamp"),
                row.get("name"),
                row.get("normalized_name"),
            )
        })
        .collect())
}

#[tokio::test]
async fn seed_applies_reverts_and_reapplies() -> Result<()> {
    if !runtime::container_runtime_available() {
        return Ok(());
    }
    let postgres = PostgresContainer::start().await?;
    let pool = db::connect(&postgres.fresh_database().await?).await?;

    db::migrate(&pool).await?;
    let expected: Vec<(String, String, String, String)> = SEED_ROLES
        .iter()
        .map(|seed| {
            (
                seed.id.to_string(),
                seed.concurrency_stamp.to_string(),
                seed.name.to_string(),
                seed.normalized_name.to_string(),
            )
        })
        .collect();
    ensure!(
        role_rows(&pool).await? == expected,
        "seeded roles do not match the fixed identities"
    );

    db::revert_to(&pool, db::SCHEMA_VERSION).await?;
    ensure!(role_rows(&pool).await?.is_empty(), "down left roles behind");

    db::migrate(&pool).await?;
    ensure!(role_rows(&pool).await?.len() == 2, "re-apply did not seed");

    db::revert_last(&pool).await?;
    ensure!(role_rows(&pool).await?.is_empty(), "revert_last kept roles");

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn raw_seed_twice_violates_unique_keys() -> Result<()> {
    if !runtime::container_runtime_available() {
        return Ok(());
    }
    let postgres = PostgresContainer::start().await?;
    let pool = db::connect(&postgres.fresh_database().await?).await?;

    db::migrate(&pool).await?;
    db::revert_to(&pool, db::SCHEMA_VERSION).await?;

    sqlx::raw_sql(db::ROLE_SEED_UP_SQL).execute(&pool).await?;
    let second = sqlx::raw_sql(db::ROLE_SEED_UP_SQL).execute(&pool).await;
    let code = second
        .err()
        .and_then(|err| err.into_database_error())
        .and_then(|err| err.code().map(|code| code.to_string()));
    ensure!(code.as_deref() == Some("23505"), "expected unique violation, got {code:?}");

    // A failed script leaves the first run intact.
    ensure!(role_rows(&pool).await?.len() == 2, "roles changed after failure");

    sqlx::raw_sql(db::ROLE_SEED_DOWN_SQL).execute(&pool).await?;
    ensure!(role_rows(&pool).await?.is_empty(), "down left roles behind");

    pool.close().await;
    Ok(())
}
