//! Streaming file download shared by the acquirer and the stem fetcher
//!
//! Bytes stream to a `.part` sibling which is renamed into place on
//! success, so a failure mid-stream never leaves a partial file that could
//! pass a later presence check.

use futures::StreamExt;
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Download failure classification shared by callers
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned {0}")]
    Http(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadError::Timeout
        } else {
            DownloadError::Network(e.to_string())
        }
    }
}

/// Stream a URL to `dest` via a temporary `.part` file.
pub(crate) async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<(), DownloadError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(DownloadError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Http(status.as_u16()));
    }

    let part_path = dest.with_extension(match dest.extension() {
        Some(ext) => format!("{}.part", ext.to_string_lossy()),
        None => "part".to_string(),
    });

    let result = write_stream(response, &part_path).await;

    if let Err(e) = result {
        // Never leave a partial file behind
        let _ = tokio::fs::remove_file(&part_path).await;
        return Err(e);
    }

    tokio::fs::rename(&part_path, dest).await?;

    Ok(())
}

async fn write_stream(response: reqwest::Response, part_path: &Path) -> Result<(), DownloadError> {
    let mut file = tokio::fs::File::create(part_path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(DownloadError::from_reqwest)?;
        file.write_all(&chunk).await?;
    }

    file.flush().await?;

    Ok(())
}
