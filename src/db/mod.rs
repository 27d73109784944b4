//! Database access for stemsep
//!
//! A single SQLite database in the root folder holds the job records and
//! the settings table. Every mutation is a single statement, so per-record
//! updates are serialized by the database rather than by a whole-store
//! read-modify-write cycle.

pub mod jobs;
pub mod settings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Connects to stemsep.db in the root folder, creating the file if absent
/// (`mode=rwc`). Any other open failure is surfaced to the caller.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Initialize stemsep tables
///
/// Creates jobs and settings tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            media_id TEXT PRIMARY KEY,
            search_term TEXT NOT NULL,
            thumbnail_ref TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            separation_handle TEXT,
            stem_refs TEXT,
            failed_reason TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (settings, jobs)");

    Ok(())
}
