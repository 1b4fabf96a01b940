//! Shared helpers for integration tests that need a real Postgres instance.
//!
//! Tests that exercise SQL (visibility traversal, pagination, cursors tied
//! to a transaction) connect to `TEST_DATABASE_URL` and skip, rather than
//! fail, when it is unset — mirroring how the teacher crate treats missing
//! prerequisites in its own integration suite.

use anyhow::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connects to `TEST_DATABASE_URL`, running migrations, or returns `None`
/// if the variable is unset so callers can skip the test.
pub async fn test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations against TEST_DATABASE_URL");

    Some(pool)
}

/// Truncates every table this crate owns so successive tests in the same
/// process don't see each other's rows.
pub async fn truncate_all(pool: &PgPool) -> Result<()> {
    sqlx::query(
        "TRUNCATE TABLE lsif_references, lsif_packages, lsif_commits, lsif_uploads RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Convenience macro-like helper: acquire a clean pool or skip the test.
///
/// Used at the top of `#[tokio::test]` functions:
/// ```ignore
/// let Some(pool) = test_helpers::test_pool().await else { return; };
/// ```
#[macro_export]
macro_rules! require_test_db {
    () => {
        match $crate::test_helpers::test_pool().await {
            Some(pool) => pool,
            None => {
                eprintln!("skipping: TEST_DATABASE_URL not set");
                return;
            }
        }
    };
}
