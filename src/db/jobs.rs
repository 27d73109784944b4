//! Job record database operations
//!
//! The persisted job collection is the sole source of truth for pipeline
//! progress. Each operation here is one SQL statement: creation is a plain
//! INSERT (unique key), the separation handle is installed with a
//! compare-and-swap UPDATE so an id can never be resubmitted, and stem
//! references land in a single UPDATE so callers never observe a
//! partially-populated completed state.

use sqlx::{Row, SqlitePool};

use crate::models::{JobRecord, StemRefs};

/// Fields persisted when a record is first created, after successful
/// acquisition.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub media_id: String,
    pub search_term: String,
    pub thumbnail_ref: String,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

/// Insert a new job record.
///
/// Creation happens exactly once per identifier; a duplicate insert is a
/// caller bug and surfaces as a constraint violation.
pub async fn create_job(pool: &SqlitePool, job: &NewJob) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO jobs (media_id, search_term, thumbnail_ref, acquired_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&job.media_id)
    .bind(&job.search_term)
    .bind(&job.thumbnail_ref)
    .bind(job.acquired_at.to_rfc3339())
    .execute(pool)
    .await?;

    tracing::info!(media_id = %job.media_id, "Job record created");

    Ok(())
}

/// Load a job record by media identifier.
pub async fn get_job(pool: &SqlitePool, media_id: &str) -> Result<Option<JobRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT media_id, search_term, thumbnail_ref, acquired_at,
               separation_handle, stem_refs, failed_reason
        FROM jobs
        WHERE media_id = ?
        "#,
    )
    .bind(media_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let acquired_at: String = row.get("acquired_at");
            let acquired_at = chrono::DateTime::parse_from_rfc3339(&acquired_at)
                .map_err(|e| sqlx::Error::Decode(format!("acquired_at: {}", e).into()))?
                .with_timezone(&chrono::Utc);

            let stem_refs: Option<String> = row.get("stem_refs");
            let stem_refs: Option<StemRefs> = stem_refs
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| sqlx::Error::Decode(format!("stem_refs: {}", e).into()))?;

            Ok(Some(JobRecord {
                media_id: row.get("media_id"),
                search_term: row.get("search_term"),
                thumbnail_ref: row.get("thumbnail_ref"),
                acquired_at,
                separation_handle: row.get("separation_handle"),
                stem_refs,
                failed_reason: row.get("failed_reason"),
            }))
        }
        None => Ok(None),
    }
}

/// Install the separation handle for a job.
///
/// Compare-and-swap: the handle is only written while none exists, so a
/// repeat submission attempt (same process or another) can never replace
/// it. Returns whether this call installed the handle.
pub async fn set_separation_handle(
    pool: &SqlitePool,
    media_id: &str,
    handle: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET separation_handle = ?
        WHERE media_id = ? AND separation_handle IS NULL
        "#,
    )
    .bind(handle)
    .bind(media_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Persist the retained stem references in a single update.
pub async fn set_stem_refs(
    pool: &SqlitePool,
    media_id: &str,
    refs: &StemRefs,
) -> Result<(), sqlx::Error> {
    let json = serde_json::to_string(refs)
        .map_err(|e| sqlx::Error::Encode(format!("stem_refs: {}", e).into()))?;

    sqlx::query("UPDATE jobs SET stem_refs = ? WHERE media_id = ?")
        .bind(json)
        .bind(media_id)
        .execute(pool)
        .await?;

    tracing::info!(media_id = %media_id, stems = refs.len(), "Stem references persisted");

    Ok(())
}

/// Record a terminal remote failure. The record is never retried after this.
pub async fn set_failed_reason(
    pool: &SqlitePool,
    media_id: &str,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE jobs SET failed_reason = ? WHERE media_id = ?")
        .bind(reason)
        .bind(media_id)
        .execute(pool)
        .await?;

    tracing::warn!(media_id = %media_id, reason = %reason, "Separation job failed remotely");

    Ok(())
}
