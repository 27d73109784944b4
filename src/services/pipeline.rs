//! Pipeline orchestration
//!
//! Composes acquisition, submission, polling, and stem retrieval into the
//! two operations callers see: [`Pipeline::acquire_and_submit`] and
//! [`Pipeline::check_status`]. The persisted job record drives every
//! decision, so both operations are idempotent and resumable across
//! restarts: a record with a handle is never resubmitted, and a terminal
//! record answers polls from the store without contacting the remote
//! service.

use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::db::jobs;
use crate::models::StemRefs;
use crate::services::audio_acquirer::{download_ref, AcquireError, AudioAcquirer};
use crate::services::separation_client::{
    PollError, RemoteStatus, SeparationClient, SubmitError,
};
use crate::services::stem_fetcher::{FetchError, StemFetcher};

/// Pipeline errors, aggregating the per-stage taxonomies
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Status queried for an id with no submission
    #[error("No separation job for media id: {0}")]
    NotFound(String),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Result of acquire-and-submit, cached or fresh
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub download_ref: String,
    pub thumbnail_ref: String,
    pub title: String,
    pub handle: String,
}

/// Result of a status check
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum StatusReport {
    Processing {
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
    },
    Completed {
        stem_refs: StemRefs,
    },
    Failed {
        reason: String,
    },
}

/// Pipeline orchestrator
pub struct Pipeline {
    db: SqlitePool,
    acquirer: AudioAcquirer,
    separation: SeparationClient,
    fetcher: StemFetcher,
    /// Per-id mutual exclusion so concurrent requests for the same id
    /// never both acquire or both fetch stems
    job_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Pipeline {
    pub fn new(
        db: SqlitePool,
        acquirer: AudioAcquirer,
        separation: SeparationClient,
        fetcher: StemFetcher,
    ) -> Self {
        Self {
            db,
            acquirer,
            separation,
            fetcher,
            job_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, media_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.job_locks.lock().await;
        locks
            .entry(media_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire audio for a media id and submit it for separation.
    ///
    /// Idempotent per id: a record with a handle is answered from the
    /// store with no network traffic; a record without a handle resumes at
    /// submission; no record runs the full acquisition first. Failures
    /// leave whatever state already persisted, and a retry is safe.
    pub async fn acquire_and_submit(
        &self,
        media_id: &str,
        search_term: &str,
    ) -> Result<SubmitOutcome, PipelineError> {
        let lock = self.lock_for(media_id).await;
        let _guard = lock.lock().await;

        let existing = jobs::get_job(&self.db, media_id).await?;

        if let Some(record) = &existing {
            if let Some(handle) = &record.separation_handle {
                tracing::info!(media_id = %media_id, "Job already submitted, returning cached result");
                return Ok(SubmitOutcome {
                    download_ref: download_ref(media_id, &format!("{}.mp3", media_id)),
                    thumbnail_ref: record.thumbnail_ref.clone(),
                    title: record.search_term.clone(),
                    handle: handle.clone(),
                });
            }
        }

        let (title, thumbnail_ref, audio_path) = match &existing {
            // Record exists but submission never happened: resume there.
            // The audio file is re-acquired only if it vanished.
            Some(record) => {
                let audio_path = self.acquirer.audio_path(media_id);
                if audio_path.exists() {
                    (record.search_term.clone(), record.thumbnail_ref.clone(), audio_path)
                } else {
                    let acquisition = self.acquirer.acquire(media_id).await?;
                    (record.search_term.clone(), record.thumbnail_ref.clone(), acquisition.audio_path)
                }
            }
            None => {
                let acquisition = self.acquirer.acquire(media_id).await?;

                let display = if search_term.trim().is_empty() {
                    acquisition.title.clone()
                } else {
                    search_term.trim().to_string()
                };

                jobs::create_job(
                    &self.db,
                    &jobs::NewJob {
                        media_id: media_id.to_string(),
                        search_term: display.clone(),
                        thumbnail_ref: acquisition.thumbnail_ref.clone(),
                        acquired_at: chrono::Utc::now(),
                    },
                )
                .await?;

                (display, acquisition.thumbnail_ref, acquisition.audio_path)
            }
        };

        let handle = self
            .separation
            .submit(&audio_path, &format!("{}.mp3", media_id))
            .await?;

        let installed = jobs::set_separation_handle(&self.db, media_id, &handle).await?;
        let handle = if installed {
            handle
        } else {
            // Another writer won the compare-and-swap; theirs is the job.
            tracing::warn!(media_id = %media_id, "Separation handle already installed, keeping existing");
            jobs::get_job(&self.db, media_id)
                .await?
                .and_then(|r| r.separation_handle)
                .unwrap_or(handle)
        };

        Ok(SubmitOutcome {
            download_ref: download_ref(media_id, &format!("{}.mp3", media_id)),
            thumbnail_ref,
            title,
            handle,
        })
    }

    /// Check the status of a previously submitted job.
    ///
    /// Terminal records answer from the store. Otherwise the remote handle
    /// is queried; on completion the stems are fetched and persisted before
    /// the completed result is reported, as a single unit. A fetch failure
    /// leaves the record in processing and the next poll retries.
    pub async fn check_status(&self, media_id: &str) -> Result<StatusReport, PipelineError> {
        let lock = self.lock_for(media_id).await;
        let _guard = lock.lock().await;

        let record = jobs::get_job(&self.db, media_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(media_id.to_string()))?;

        let handle = record
            .separation_handle
            .clone()
            .ok_or_else(|| PipelineError::NotFound(media_id.to_string()))?;

        if let Some(refs) = record.stem_refs {
            return Ok(StatusReport::Completed { stem_refs: refs });
        }

        if let Some(reason) = record.failed_reason {
            return Ok(StatusReport::Failed { reason });
        }

        match self.separation.status(&handle).await? {
            RemoteStatus::Processing { progress } => Ok(StatusReport::Processing { progress }),
            RemoteStatus::Failed { message } => {
                jobs::set_failed_reason(&self.db, media_id, &message).await?;
                Ok(StatusReport::Failed { reason: message })
            }
            RemoteStatus::Done { files } => {
                let refs = self.fetcher.fetch_stems(media_id, &files).await?;
                jobs::set_stem_refs(&self.db, media_id, &refs).await?;
                self.fetcher.cleanup(media_id, &refs).await;
                Ok(StatusReport::Completed { stem_refs: refs })
            }
        }
    }
}
