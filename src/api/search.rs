//! Search API handler
//!
//! Read-only; no pipeline side effects.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::AppState;

const SEARCH_LIMIT: usize = 10;

/// GET /api/songs query parameters
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// One search result as rendered to callers
#[derive(Debug, Serialize)]
pub struct SongSummary {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail_url: String,
    /// Echo of the trimmed query, stored as the display label on download
    pub search_term: String,
}

/// GET /api/songs?q=<query>
///
/// Empty query returns an empty list. The query is suffixed with " song"
/// before it reaches the provider, matching how callers expect music-first
/// ranking.
pub async fn search_songs(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<SongSummary>>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let hits = state
        .resolver
        .search(&format!("{} song", q), SEARCH_LIMIT)
        .await?;

    tracing::debug!(query = %q, results = hits.len(), "Search completed");

    let songs = hits
        .into_iter()
        .map(|hit| SongSummary {
            id: hit.id,
            title: hit.title,
            artist: hit.artist,
            thumbnail_url: hit.thumbnail_url,
            search_term: q.to_string(),
        })
        .collect();

    Ok(Json(songs))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/songs", get(search_songs))
}
