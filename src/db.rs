//! SQLite schema setup.

use anyhow::Result;
use sqlx::SqlitePool;

/// Initial schema plus the default collections, embedded at build time.
const INIT_SQL: &str = include_str!("../migrations/0001_init.sql");

/// Apply the embedded migration statement by statement.
///
/// Every statement is `IF NOT EXISTS` / `OR IGNORE`, so running this on an
/// already-initialised database is a no-op.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    let statements = INIT_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

/// Single-connection in-memory database with the schema applied.
#[cfg(test)]
pub async fn test_pool() -> std::sync::Arc<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    run_migrations(&pool).await.expect("migrations");
    std::sync::Arc::new(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent_and_seed_default_collections() {
        let pool = test_pool().await;
        run_migrations(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&*pool)
            .await
            .unwrap();
        assert_eq!(count, 5);
    }
}
