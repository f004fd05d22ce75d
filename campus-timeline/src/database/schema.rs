//! Database schema and migrations
//!
//! This module handles database initialization and schema migrations.
//! Uses SQLite with WAL mode for better concurrency and crash safety.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing timeline schema");

    // WAL lets feed readers proceed while publications are appended
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current timeline schema version: {}", current_version);

    let applied = apply_migrations(pool, current_version).await?;

    tracing::info!("Timeline schema ready ({} migrations applied)", applied);
    Ok(())
}

/// Apply every migration newer than `current_version`, each in its own
/// transaction. Returns how many were applied.
async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<usize> {
    let pending: Vec<_> = get_migrations()
        .into_iter()
        .filter(|(version, _)| *version > current_version)
        .collect();

    for (version, sql) in &pending {
        let statements: Vec<&str> = sql.split(';').filter(|s| !s.trim().is_empty()).collect();
        tracing::info!("Applying migration {} ({} statements)", version, statements.len());

        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(*version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(pending.len())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial_schema.sql"))]
}
