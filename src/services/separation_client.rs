//! Source-separation service client
//!
//! Two calls against the external service: a multipart upload that creates
//! a remote job and returns its handle (a URL), and a status query against
//! that handle. Responses are untrusted; anything that is not the expected
//! JSON shape is an error, never a panic.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Submission errors
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service returned {0}: {1}")]
    Api(u16, String),

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Service reported unsuccessful submission")]
    Unsuccessful,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Status-query errors (transient; the caller retries with backoff)
#[derive(Debug, Error)]
pub enum PollError {
    #[error("Status query failed: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Service returned {0}: {1}")]
    Api(u16, String),

    #[error("Malformed status response: {0}")]
    Parse(String),
}

/// One output file advertised by a completed remote job
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub url: String,
    /// Display name of the output, when the service provides one
    #[serde(default)]
    pub download: Option<String>,
}

impl RemoteFile {
    /// Stem name for role mapping: the advertised name when present,
    /// otherwise the URL's base name, without extension or query string.
    pub fn stem_name(&self) -> String {
        let raw = self
            .download
            .as_deref()
            .unwrap_or_else(|| self.url.rsplit('/').next().unwrap_or(""));
        let raw = raw.split('?').next().unwrap_or(raw);
        let raw = raw.rsplit('/').next().unwrap_or(raw);
        match raw.rsplit_once('.') {
            Some((base, _ext)) => base.to_string(),
            None => raw.to_string(),
        }
    }
}

/// Classified remote job status
#[derive(Debug, Clone)]
pub enum RemoteStatus {
    /// In progress (also covers queued, and "done" with no output listed
    /// yet; completion requires a non-empty file list)
    Processing { progress: Option<f64> },
    /// Finished with output files to retrieve
    Done { files: Vec<RemoteFile> },
    /// Remote reports failure; terminal
    Failed { message: String },
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<CreateData>,
}

#[derive(Debug, Deserialize)]
struct CreateData {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    data: Option<StatusData>,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    files: Option<Vec<RemoteFile>>,
    #[serde(default)]
    message: Option<String>,
}

/// Separation service client
#[derive(Clone)]
pub struct SeparationClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl SeparationClient {
    pub fn new(
        base_url: String,
        api_token: String,
        timeout: Duration,
    ) -> Result<Self, SubmitError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::Upload(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    /// Upload an audio file and obtain the remote job handle.
    ///
    /// Must be called at most once per media id; the orchestrator checks
    /// the persisted handle before invoking this.
    pub async fn submit(
        &self,
        audio_path: &Path,
        file_name: &str,
    ) -> Result<String, SubmitError> {
        let bytes = tokio::fs::read(audio_path).await?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| SubmitError::Upload(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("api_token", self.api_token.clone())
            .part("audiofile", part);

        let url = format!("{}/api/separation/create", self.base_url);

        tracing::info!(file_name = %file_name, "Submitting audio to separation service");

        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmitError::Timeout
                } else {
                    SubmitError::Upload(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::Upload(e.to_string()))?;

        if !status.is_success() {
            return Err(SubmitError::Api(status.as_u16(), body));
        }

        let parsed: CreateResponse =
            serde_json::from_str(&body).map_err(|e| SubmitError::Parse(e.to_string()))?;

        let link = match (parsed.success, parsed.data.and_then(|d| d.link)) {
            (true, Some(link)) => link,
            _ => return Err(SubmitError::Unsuccessful),
        };

        tracing::info!(handle = %link, "Separation job created");

        Ok(link)
    }

    /// Query a job handle and classify the remote status.
    pub async fn status(&self, handle: &str) -> Result<RemoteStatus, PollError> {
        tracing::debug!(handle = %handle, "Querying separation job status");

        let response = self.http_client.get(handle).send().await.map_err(|e| {
            if e.is_timeout() {
                PollError::Timeout
            } else {
                PollError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PollError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(PollError::Api(status.as_u16(), body));
        }

        let parsed: StatusResponse =
            serde_json::from_str(&body).map_err(|e| PollError::Parse(e.to_string()))?;

        Ok(classify(parsed))
    }
}

/// Classify a raw status response.
///
/// Completion requires status "done" AND a non-empty file list; "done"
/// without files stays Processing so the next poll retries.
fn classify(response: StatusResponse) -> RemoteStatus {
    let data = response.data;
    match response.status.as_str() {
        "failed" => RemoteStatus::Failed {
            message: data
                .and_then(|d| d.message)
                .unwrap_or_else(|| "separation failed".to_string()),
        },
        "done" => {
            let files = data.and_then(|d| d.files).unwrap_or_default();
            if files.is_empty() {
                RemoteStatus::Processing { progress: None }
            } else {
                RemoteStatus::Done { files }
            }
        }
        _ => RemoteStatus::Processing {
            progress: data.and_then(|d| d.progress),
        },
    }
}
