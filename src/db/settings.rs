//! Settings database operations
//!
//! Key-value accessors for the settings table. The database tier is the
//! authoritative source for the separation API token (ahead of ENV and
//! TOML, see `config::resolve_separation_api_token`).

use sqlx::{Pool, Sqlite};

/// Get separation service API token from database
///
/// Returns Some(token) if set, None otherwise
pub async fn get_separation_api_token(db: &Pool<Sqlite>) -> Result<Option<String>, sqlx::Error> {
    get_setting(db, "separation_api_token").await
}

/// Set separation service API token in database
pub async fn set_separation_api_token(db: &Pool<Sqlite>, token: String) -> Result<(), sqlx::Error> {
    set_setting(db, "separation_api_token", token).await
}

/// Generic setting getter (internal)
async fn get_setting(db: &Pool<Sqlite>, key: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    Ok(row.map(|(value,)| value))
}

/// Generic setting setter (internal)
async fn set_setting(db: &Pool<Sqlite>, key: &str, value: String) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;

    Ok(())
}
