use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Initialize the metadata database pool, running migrations as needed.
pub async fn init_pool() -> Result<PgPool> {
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL environment variable must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections())
        .connect(&database_url)
        .await
        .with_context(|| format!("failed to connect to {database_url}"))?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

fn max_connections() -> u32 {
    std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}
