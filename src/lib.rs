//! stemsep library interface
//!
//! Exposes the application state, router construction, and the pipeline
//! services for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{MediaResolver, Pipeline};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool holding the job store
    pub db: SqlitePool,
    /// Media resolution provider client (search)
    pub resolver: MediaResolver,
    /// Pipeline orchestrator
    pub pipeline: Arc<Pipeline>,
    /// Identifier-scoped downloads directory
    pub downloads_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        resolver: MediaResolver,
        pipeline: Arc<Pipeline>,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            resolver,
            pipeline,
            downloads_dir,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::search_routes())
        .merge(api::job_routes())
        .merge(api::file_routes())
        .merge(api::settings_routes())
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
