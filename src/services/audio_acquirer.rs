//! Audio acquisition into identifier-scoped storage
//!
//! Materializes the best-available audio-only stream and the thumbnail
//! under `<root>/<media_id>/`. Acquisition is idempotent at the storage
//! level: files already present are not re-downloaded, independent of the
//! job store. The thumbnail is required; a thumbnail failure fails the
//! acquisition because downstream display depends on it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::services::download::{download_to_file, DownloadError};
use crate::services::media_resolver::{MediaResolver, ResolveError};

/// Thumbnail file name inside the identifier directory
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// Acquisition errors
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Audio download failed: {0}")]
    AudioDownload(String),

    #[error("Thumbnail download failed: {0}")]
    ThumbnailDownload(String),

    #[error("Request timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful acquisition
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Resolved display title from the provider
    pub title: String,
    /// Local audio file path
    pub audio_path: PathBuf,
    /// Caller-facing reference to the thumbnail
    pub thumbnail_ref: String,
}

/// Audio acquirer service
pub struct AudioAcquirer {
    resolver: MediaResolver,
    http_client: reqwest::Client,
    root: PathBuf,
    download_slots: Arc<Semaphore>,
}

impl AudioAcquirer {
    pub fn new(
        resolver: MediaResolver,
        root: PathBuf,
        timeout: Duration,
        download_slots: Arc<Semaphore>,
    ) -> Result<Self, AcquireError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AcquireError::AudioDownload(e.to_string()))?;

        Ok(Self {
            resolver,
            http_client,
            root,
            download_slots,
        })
    }

    /// Identifier-scoped storage directory for one media item
    pub fn media_dir(&self, media_id: &str) -> PathBuf {
        self.root.join(media_id)
    }

    /// Local path of the source audio file for one media item
    pub fn audio_path(&self, media_id: &str) -> PathBuf {
        self.media_dir(media_id).join(format!("{}.mp3", media_id))
    }

    /// Local path of the thumbnail for one media item
    pub fn thumbnail_path(&self, media_id: &str) -> PathBuf {
        self.media_dir(media_id).join(THUMBNAIL_FILE)
    }

    /// Acquire audio and thumbnail for a media identifier.
    ///
    /// Resolves metadata, then downloads whichever of the two files is not
    /// already present. Both must exist on return.
    pub async fn acquire(&self, media_id: &str) -> Result<Acquisition, AcquireError> {
        let streams = self.resolver.resolve_streams(media_id).await?;

        let dir = self.media_dir(media_id);
        tokio::fs::create_dir_all(&dir).await?;

        let thumbnail_path = self.thumbnail_path(media_id);
        if !thumbnail_path.exists() {
            let url = streams
                .thumbnail_url
                .as_deref()
                .ok_or_else(|| {
                    AcquireError::ThumbnailDownload(format!("no thumbnail URL for {}", media_id))
                })?;

            let _permit = self.download_slots.acquire().await.expect("semaphore closed");
            download_to_file(&self.http_client, url, &thumbnail_path)
                .await
                .map_err(|e| match e {
                    DownloadError::Timeout => AcquireError::Timeout,
                    DownloadError::Io(io) => AcquireError::Io(io),
                    other => AcquireError::ThumbnailDownload(other.to_string()),
                })?;

            tracing::debug!(media_id = %media_id, "Thumbnail downloaded");
        }

        let audio_path = self.audio_path(media_id);
        if audio_path.exists() {
            tracing::info!(media_id = %media_id, "Audio already present, skipping download");
        } else {
            tracing::info!(media_id = %media_id, "Starting audio download");

            let _permit = self.download_slots.acquire().await.expect("semaphore closed");
            download_to_file(&self.http_client, &streams.audio_url, &audio_path)
                .await
                .map_err(|e| match e {
                    DownloadError::Timeout => AcquireError::Timeout,
                    DownloadError::Io(io) => AcquireError::Io(io),
                    other => AcquireError::AudioDownload(other.to_string()),
                })?;

            tracing::info!(media_id = %media_id, "Audio download completed");
        }

        Ok(Acquisition {
            title: streams.title,
            thumbnail_ref: download_ref(media_id, THUMBNAIL_FILE),
            audio_path,
        })
    }
}

/// Caller-facing reference for a file in identifier-scoped storage,
/// served by `GET /api/downloads/:media_id/:file_name`.
pub fn download_ref(media_id: &str, file_name: &str) -> String {
    format!("/api/downloads/{}/{}", media_id, file_name)
}
