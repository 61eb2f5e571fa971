use anyhow::Context;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;

pub const MIGRATIONS_DIR: &str = "./migrations";

pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new(MIGRATIONS_DIR))
        .await
        .context("Failed to load migrations")?;

    tracing::info!("Running database migrations...");
    migrator.run(pool).await.context("Failed to run migrations")?;
    tracing::info!("Database migrations completed");

    Ok(())
}
