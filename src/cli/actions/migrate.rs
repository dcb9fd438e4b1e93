use crate::{cli::commands::migrate::Direction, db};
use anyhow::Result;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub direction: Direction,
}

/// Apply or revert migrations, then exit.
/// # Errors
/// Returns an error if the database is unreachable or a migration fails.
pub async fn execute(args: Args) -> Result<()> {
    let pool = db::connect(&args.dsn).await?;

    match args.direction {
        Direction::Up => db::migrate(&pool).await?,
        Direction::RevertLast => db::revert_last(&pool).await?,
        Direction::RevertTo(target) => db::revert_to(&pool, target).await?,
    }

    pool.close().await;
    info!("migrate finished");
    Ok(())
}
