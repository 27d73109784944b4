//! Acquisition and status API handlers
//!
//! Thin layer over the pipeline orchestrator: download triggers
//! acquire-and-submit, status triggers the poll/fetch state machine.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::pipeline::StatusReport;
use crate::AppState;

/// GET /api/songs/download/:media_id query parameters
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    #[serde(default)]
    pub search_term: String,
}

/// Download response; always "processing" because separation is
/// asynchronous and callers poll for completion
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub download_ref: String,
    pub thumbnail_ref: String,
    pub title: String,
    pub state: &'static str,
    pub handle: String,
}

/// GET /api/songs/download/:media_id?search_term=
///
/// Idempotent per id: repeat calls return the cached result without
/// re-downloading or re-submitting.
pub async fn download_song(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Json<DownloadResponse>> {
    validate_media_id(&media_id)?;

    let outcome = state
        .pipeline
        .acquire_and_submit(&media_id, &query.search_term)
        .await?;

    Ok(Json(DownloadResponse {
        download_ref: outcome.download_ref,
        thumbnail_ref: outcome.thumbnail_ref,
        title: outcome.title,
        state: "processing",
        handle: outcome.handle,
    }))
}

/// GET /api/songs/status/:media_id
///
/// Returns processing/completed/failed for a previously submitted job;
/// 404 when the id was never submitted.
pub async fn job_status(
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> ApiResult<Json<StatusReport>> {
    validate_media_id(&media_id)?;

    let report = state.pipeline.check_status(&media_id).await?;

    tracing::debug!(media_id = %media_id, report = ?report, "Status query");

    Ok(Json(report))
}

/// Media ids are opaque but must stay a single safe path component,
/// since they name the storage directory.
fn validate_media_id(media_id: &str) -> Result<(), ApiError> {
    let safe = !media_id.is_empty()
        && media_id != "."
        && media_id != ".."
        && media_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if safe {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid media id: {}",
            media_id
        )))
    }
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/songs/download/:media_id", get(download_song))
        .route("/api/songs/status/:media_id", get(job_status))
}
