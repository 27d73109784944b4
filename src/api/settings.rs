//! Settings API endpoint
//!
//! POST /api/settings/separation_api_token stores the separation service
//! token in the database, the authoritative configuration tier.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request payload for setting the separation API token
#[derive(Debug, Deserialize)]
pub struct SetTokenRequest {
    pub api_token: String,
}

/// Response payload for token configuration
#[derive(Debug, Serialize)]
pub struct SetTokenResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings/separation_api_token
///
/// Takes effect for jobs submitted after the next service restart; the
/// running separation client keeps the token it was built with.
pub async fn set_separation_api_token(
    State(state): State<AppState>,
    Json(payload): Json<SetTokenRequest>,
) -> ApiResult<Json<SetTokenResponse>> {
    if !crate::config::is_valid_token(&payload.api_token) {
        return Err(ApiError::BadRequest(
            "API token cannot be empty or whitespace-only".to_string(),
        ));
    }

    crate::db::settings::set_separation_api_token(&state.db, payload.api_token)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save API token: {}", e)))?;

    info!("Separation API token configured via API");

    Ok(Json(SetTokenResponse {
        success: true,
        message: "Separation API token configured successfully".to_string(),
    }))
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/api/settings/separation_api_token",
        post(set_separation_api_token),
    )
}
