//! stemsep - Stem Separation Service
//!
//! Searches for media items, acquires their audio into identifier-scoped
//! storage, submits the audio to an external source-separation service,
//! and serves the retained stems once the remote job completes.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use stemsep::config::{self, Config, TomlConfig};
use stemsep::services::{AudioAcquirer, MediaResolver, Pipeline, SeparationClient, StemFetcher};
use stemsep::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting stemsep (Stem Separation Service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration: ENV -> TOML -> defaults
    let toml_config = TomlConfig::load();
    let app_config = Config::resolve(&toml_config)?;
    info!("Root folder: {}", app_config.root_folder.display());

    // Open or create the database in the root folder
    let db_path = app_config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = stemsep::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Separation API token: Database -> ENV -> TOML
    let api_token = config::resolve_separation_api_token(&db_pool, &toml_config).await?;

    // Wire up pipeline services
    let downloads_dir = app_config.downloads_dir();
    tokio::fs::create_dir_all(&downloads_dir).await?;

    // One bound shared by every outbound download
    let download_slots = Arc::new(tokio::sync::Semaphore::new(app_config.download_concurrency));

    let resolver = MediaResolver::new(
        app_config.media_base_url.clone(),
        app_config.request_timeout,
    )?;
    let acquirer = AudioAcquirer::new(
        resolver.clone(),
        downloads_dir.clone(),
        app_config.request_timeout,
        Arc::clone(&download_slots),
    )?;
    let separation = SeparationClient::new(
        app_config.separation_base_url.clone(),
        api_token,
        app_config.request_timeout,
    )?;
    let fetcher = StemFetcher::new(
        downloads_dir.clone(),
        app_config.request_timeout,
        download_slots,
    )?;

    let pipeline = Arc::new(Pipeline::new(db_pool.clone(), acquirer, separation, fetcher));

    let state = AppState::new(db_pool, resolver, pipeline, downloads_dir);

    // Build router and serve
    let app = stemsep::build_router(state);
    let addr = format!("127.0.0.1:{}", app_config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
