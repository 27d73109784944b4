//! Error types for stemsep
//!
//! Every error reaches callers as `{error: {code, message}}` JSON. Codes
//! separate retryable conditions (POLL_ERROR, TIMEOUT) from terminal ones
//! so callers can decide whether to back off and retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::audio_acquirer::AcquireError;
use crate::services::media_resolver::ResolveError;
use crate::services::pipeline::PipelineError;
use crate::services::separation_client::{PollError, SubmitError};
use crate::services::stem_fetcher::FetchError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Pipeline failure; mapped per stage
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Search/stream resolution failure outside the pipeline
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Pipeline(e) => pipeline_response(e),
            ApiError::Resolve(e) => resolve_response(e),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Map a resolution error to status, code, and message.
fn resolve_response(e: ResolveError) -> (StatusCode, &'static str, String) {
    match &e {
        ResolveError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
        ResolveError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", e.to_string()),
        _ => (StatusCode::BAD_GATEWAY, "RESOLUTION_ERROR", e.to_string()),
    }
}

/// Map a pipeline error to status, code, and message.
fn pipeline_response(e: PipelineError) -> (StatusCode, &'static str, String) {
    match &e {
        PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),

        PipelineError::Acquire(acquire) => match acquire {
            AcquireError::Resolve(ResolveError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            }
            AcquireError::Resolve(ResolveError::Timeout) | AcquireError::Timeout => {
                (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", e.to_string())
            }
            AcquireError::Resolve(_) => {
                (StatusCode::BAD_GATEWAY, "RESOLUTION_ERROR", e.to_string())
            }
            _ => (StatusCode::BAD_GATEWAY, "ACQUISITION_ERROR", e.to_string()),
        },

        PipelineError::Submit(SubmitError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", e.to_string())
        }
        PipelineError::Submit(_) => (StatusCode::BAD_GATEWAY, "SUBMISSION_ERROR", e.to_string()),

        PipelineError::Poll(PollError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", e.to_string())
        }
        PipelineError::Poll(_) => (StatusCode::BAD_GATEWAY, "POLL_ERROR", e.to_string()),

        PipelineError::Fetch(FetchError::Timeout) => {
            (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", e.to_string())
        }
        PipelineError::Fetch(_) => (StatusCode::BAD_GATEWAY, "STEM_FETCH_ERROR", e.to_string()),

        PipelineError::Store(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORE_ERROR",
            e.to_string(),
        ),
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
