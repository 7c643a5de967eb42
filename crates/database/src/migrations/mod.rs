use crate::pool::DbPool;
use anyhow::{Context, Result};
use tracing::info;

// Migration SQL is embedded at compile time; nothing resolves paths at
// runtime, so the binary can run from any working directory.
mod embedded {
    refinery::embed_migrations!("src/migrations/sql");
}

/// Apply any pending schema migrations
pub async fn run(pool: &DbPool) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .context("Failed to get database connection for migrations")?;

    let report = embedded::migrations::runner()
        .run_async(&mut **client)
        .await
        .context("Failed to run migrations")?;

    for migration in report.applied_migrations() {
        info!("Applied migration: {}", migration.name());
    }
    Ok(())
}
