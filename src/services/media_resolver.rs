//! Media resolution provider client
//!
//! Narrow contract over the external search/stream-resolution provider:
//! a text search returning candidate items, and per-identifier stream
//! descriptors with quality metadata and a thumbnail URL. The provider is
//! untrusted; malformed responses are errors, not crashes.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Media resolver errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Media item not found: {0}")]
    NotFound(String),

    #[error("No audio-only stream available for {0}")]
    NoAudioStream(String),

    #[error("Provider error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ResolveError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Timeout
        } else {
            ResolveError::Network(e.to_string())
        }
    }
}

/// One search result, mapped for display
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail_url: String,
}

/// Resolved stream metadata for one media identifier
#[derive(Debug, Clone)]
pub struct MediaStreams {
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Best-available audio-only stream URL (highest audio bitrate)
    pub audio_url: String,
}

#[derive(Debug, Deserialize)]
struct ProviderSearchItem {
    id: String,
    title: String,
    channel: Option<String>,
    thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderStreams {
    title: String,
    thumbnail_url: Option<String>,
    formats: Vec<ProviderFormat>,
}

#[derive(Debug, Deserialize)]
struct ProviderFormat {
    url: String,
    #[serde(default)]
    audio_bitrate: Option<u32>,
    #[serde(default)]
    has_video: bool,
}

/// Media resolution provider client
#[derive(Clone)]
pub struct MediaResolver {
    http_client: reqwest::Client,
    base_url: String,
}

impl MediaResolver {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ResolveError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Search for media items matching a query.
    ///
    /// Safe-search is always requested; the provider's ranking is opaque.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ResolveError> {
        let url = format!("{}/search", self.base_url);
        let limit = limit.to_string();

        tracing::debug!(query = %query, limit = %limit, "Querying media provider search");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("limit", limit.as_str()), ("safe", "true")])
            .send()
            .await
            .map_err(ResolveError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolveError::Api(status.as_u16(), error_text));
        }

        let items: Vec<ProviderSearchItem> = response
            .json()
            .await
            .map_err(|e| ResolveError::Parse(e.to_string()))?;

        Ok(items
            .into_iter()
            .map(|item| SearchHit {
                id: item.id,
                title: item.title,
                artist: item.channel.unwrap_or_else(|| "Unknown Artist".to_string()),
                thumbnail_url: item.thumbnail_url.unwrap_or_default(),
            })
            .collect())
    }

    /// Resolve stream descriptors for one identifier and pick the
    /// best-available audio-only stream.
    pub async fn resolve_streams(&self, media_id: &str) -> Result<MediaStreams, ResolveError> {
        let url = format!("{}/streams/{}", self.base_url, media_id);

        tracing::debug!(media_id = %media_id, "Resolving media streams");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ResolveError::from_reqwest)?;

        let status = response.status();

        if status == 404 {
            return Err(ResolveError::NotFound(media_id.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolveError::Api(status.as_u16(), error_text));
        }

        let streams: ProviderStreams = response
            .json()
            .await
            .map_err(|e| ResolveError::Parse(e.to_string()))?;

        let audio_url = best_audio_format(&streams.formats)
            .ok_or_else(|| ResolveError::NoAudioStream(media_id.to_string()))?
            .url
            .clone();

        tracing::info!(
            media_id = %media_id,
            title = %streams.title,
            "Resolved audio stream"
        );

        Ok(MediaStreams {
            title: streams.title,
            thumbnail_url: streams.thumbnail_url,
            audio_url,
        })
    }
}

/// Highest-bitrate audio-only format, if any.
fn best_audio_format(formats: &[ProviderFormat]) -> Option<&ProviderFormat> {
    formats
        .iter()
        .filter(|f| !f.has_video && f.audio_bitrate.is_some())
        .max_by_key(|f| f.audio_bitrate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = MediaResolver::new(
            "http://127.0.0.1:9/".to_string(),
            Duration::from_secs(5),
        );
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://127.0.0.1:9");
    }

    #[test]
    fn test_best_audio_format_prefers_highest_bitrate() {
        let formats: Vec<ProviderFormat> = serde_json::from_str(
            r#"[
                {"url": "a", "audio_bitrate": 128, "has_video": false},
                {"url": "b", "audio_bitrate": 256, "has_video": false},
                {"url": "c", "audio_bitrate": 320, "has_video": true}
            ]"#,
        )
        .unwrap();

        let best = best_audio_format(&formats).unwrap();
        assert_eq!(best.url, "b");
    }

    #[test]
    fn test_best_audio_format_none_without_audio_only() {
        let formats: Vec<ProviderFormat> = serde_json::from_str(
            r#"[
                {"url": "a", "audio_bitrate": 128, "has_video": true},
                {"url": "b", "has_video": false}
            ]"#,
        )
        .unwrap();

        assert!(best_audio_format(&formats).is_none());
    }

    #[test]
    fn test_search_item_parsing_with_missing_fields() {
        let items: Vec<ProviderSearchItem> = serde_json::from_str(
            r#"[{"id": "abc123", "title": "Summer Nights"}]"#,
        )
        .unwrap();

        assert_eq!(items[0].id, "abc123");
        assert!(items[0].channel.is_none());
    }
}
