//! Identifier-scoped file serving
//!
//! Serves any persisted local file (source audio, thumbnail, retained
//! stems) by media identifier and file name. Both path components are
//! validated; nothing outside the downloads directory is reachable.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/downloads/:media_id/:file_name
pub async fn serve_download(
    State(state): State<AppState>,
    Path((media_id, file_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    if !is_safe_component(&media_id) || !is_safe_component(&file_name) {
        return Err(ApiError::BadRequest("Invalid file path".to_string()));
    }

    let path = state.downloads_dir.join(&media_id).join(&file_name);

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            StatusCode::OK,
            [("content-type", content_type_for(&file_name))],
            bytes,
        )
            .into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::NotFound(format!(
            "File not found: {}/{}",
            media_id, file_name
        ))),
        Err(e) => Err(ApiError::Io(e)),
    }
}

/// Single path component from a restricted alphabet; never a traversal.
fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && component
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Build file serving routes
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/api/downloads/:media_id/:file_name", get(serve_download))
}
