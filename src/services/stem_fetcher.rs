//! Stem retrieval and space reclamation
//!
//! The remote service produces more stem types than we retain. Every
//! advertised output downloads to a temporary name inside the identifier
//! directory; only after all downloads succeed are the retained roles
//! renamed into their final names and returned as references. Cleanup then
//! removes the leftover temporaries and the source audio file, a set
//! disjoint from the retained files by construction, so a referenced stem
//! is never deleted.

use futures::stream::{FuturesUnordered, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::models::{StemRefs, StemRole};
use crate::services::audio_acquirer::download_ref;
use crate::services::download::{download_to_file, DownloadError};
use crate::services::separation_client::RemoteFile;

/// Extension used for downloaded-but-not-yet-retained stem files
const TEMP_EXT: &str = "stem";

/// Stem retrieval errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Stem download failed: {0}")]
    Download(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Remote output missing required stem: {0}")]
    MissingStem(StemRole),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One remote output with its local bookkeeping
struct StemPlan {
    url: String,
    role: Option<StemRole>,
    temp_path: PathBuf,
    final_path: Option<PathBuf>,
}

/// Stem fetcher service
pub struct StemFetcher {
    http_client: reqwest::Client,
    root: PathBuf,
    download_slots: Arc<Semaphore>,
}

impl StemFetcher {
    pub fn new(
        root: PathBuf,
        timeout: Duration,
        download_slots: Arc<Semaphore>,
    ) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Download(e.to_string()))?;

        Ok(Self {
            http_client,
            root,
            download_slots,
        })
    }

    /// Download all remote outputs and install the retained subset.
    ///
    /// Idempotent: outputs already present (completed temporary or final
    /// retained file) are not re-downloaded, so a retry after a partial
    /// failure only fetches what is missing.
    pub async fn fetch_stems(
        &self,
        media_id: &str,
        files: &[RemoteFile],
    ) -> Result<StemRefs, FetchError> {
        let dir = self.root.join(media_id);
        tokio::fs::create_dir_all(&dir).await?;

        let plans: Vec<StemPlan> = files
            .iter()
            .map(|file| {
                let name = sanitize(&file.stem_name());
                let role = StemRole::from_remote_name(&name);
                StemPlan {
                    url: file.url.clone(),
                    role,
                    temp_path: dir.join(format!("{}.{}", name, TEMP_EXT)),
                    final_path: role.map(|r| dir.join(r.file_name(media_id))),
                }
            })
            .collect();

        let mut downloads = FuturesUnordered::new();
        let mut queued: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();
        for plan in &plans {
            let already_retained = plan
                .final_path
                .as_ref()
                .map(|p| p.exists())
                .unwrap_or(false);
            if already_retained || plan.temp_path.exists() {
                continue;
            }
            // Duplicate remote names would race on the same temporary
            if !queued.insert(plan.temp_path.clone()) {
                continue;
            }

            let client = self.http_client.clone();
            let slots = Arc::clone(&self.download_slots);
            let url = plan.url.clone();
            let temp_path = plan.temp_path.clone();
            downloads.push(async move {
                let _permit = slots.acquire().await.expect("semaphore closed");
                download_to_file(&client, &url, &temp_path).await
            });
        }

        let total = downloads.len();
        tracing::info!(media_id = %media_id, outputs = files.len(), to_fetch = total, "Fetching stems");

        while let Some(result) = downloads.next().await {
            result.map_err(|e| match e {
                DownloadError::Timeout => FetchError::Timeout,
                DownloadError::Io(io) => FetchError::Io(io),
                other => FetchError::Download(other.to_string()),
            })?;
        }

        // All downloads present; install the retained roles. First match
        // per role wins; later duplicates stay temporary and are cleaned.
        let mut refs = StemRefs::new();
        for role in StemRole::ALL {
            let plan = plans
                .iter()
                .find(|p| p.role == Some(role))
                .ok_or(FetchError::MissingStem(role))?;

            let final_path = plan.final_path.as_ref().expect("role implies final path");
            if !final_path.exists() {
                tokio::fs::rename(&plan.temp_path, final_path).await?;
            }

            refs.insert(role, download_ref(media_id, &role.file_name(media_id)));
        }

        tracing::info!(media_id = %media_id, "Retained stems installed");

        Ok(refs)
    }

    /// Remove everything not retained: leftover stem temporaries and the
    /// source audio file. Operates only on names that cannot collide with
    /// retained references; individual failures are logged, not fatal.
    pub async fn cleanup(&self, media_id: &str, refs: &StemRefs) {
        let dir = self.root.join(media_id);

        let retained: Vec<String> = refs
            .keys()
            .map(|role| role.file_name(media_id))
            .collect();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(media_id = %media_id, error = %e, "Cleanup skipped: cannot read directory");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            if retained.iter().any(|r| *r == name) {
                continue;
            }

            let is_temp = path.extension().map(|e| e == TEMP_EXT).unwrap_or(false);
            let is_source = name == format!("{}.mp3", media_id);

            if is_temp || is_source {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => tracing::debug!(media_id = %media_id, file = %name, "Removed"),
                    Err(e) => {
                        tracing::warn!(media_id = %media_id, file = %name, error = %e, "Cleanup failed")
                    }
                }
            }
        }
    }
}

/// Restrict remote-derived names to a safe file-name alphabet.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned
    }
}
