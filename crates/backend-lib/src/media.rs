// ============================
// crates/backend-lib/src/media.rs
// ============================
//! Track retrieval from the external media source.
//!
//! Thin collaborator: the core only needs `lookup` to resolve a pasted
//! link into track metadata and `fetch_audio` to pull the playable
//! bytes. Both calls are bounded by the client timeout so a stalled
//! upstream surfaces an error instead of hanging the submit.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ContestError;

/// What a resolved link tells us about the track.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    /// Opaque id at the media source
    pub id: String,
    /// Human title; sanitized into the submission id
    pub title: String,
}

/// External media source interface.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn lookup(&self, link: &str) -> Result<TrackMetadata, ContestError>;
    async fn fetch_audio(&self, link: &str) -> Result<Vec<u8>, ContestError>;
}

const RESOLVE_URL: &str = "https://api-v2.soundcloud.com/resolve";

#[derive(Deserialize)]
struct ResolvedTrack {
    id: u64,
    title: String,
    media: TrackMedia,
}

#[derive(Deserialize)]
struct TrackMedia {
    transcodings: Vec<Transcoding>,
}

#[derive(Deserialize)]
struct Transcoding {
    url: String,
    format: TranscodingFormat,
}

#[derive(Deserialize)]
struct TranscodingFormat {
    protocol: String,
}

#[derive(Deserialize)]
struct StreamLocation {
    url: String,
}

/// SoundCloud-backed media source.
pub struct SoundcloudSource {
    http: reqwest::Client,
    client_id: String,
}

impl SoundcloudSource {
    pub fn new(client_id: String, timeout: Duration) -> Result<Self, ContestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContestError::Internal(format!("http client: {e}")))?;
        Ok(SoundcloudSource { http, client_id })
    }

    async fn resolve(&self, link: &str) -> Result<ResolvedTrack, ContestError> {
        let response = self
            .http
            .get(RESOLVE_URL)
            .query(&[("url", link), ("client_id", &self.client_id)])
            .send()
            .await
            .map_err(|e| ContestError::TrackLookupFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ContestError::TrackLookupFailed(e.to_string()))?;

        response
            .json::<ResolvedTrack>()
            .await
            .map_err(|e| ContestError::TrackLookupFailed(e.to_string()))
    }
}

#[async_trait]
impl MediaSource for SoundcloudSource {
    async fn lookup(&self, link: &str) -> Result<TrackMetadata, ContestError> {
        let track = self.resolve(link).await?;
        debug!(track = track.id, title = %track.title, "track resolved");
        Ok(TrackMetadata {
            id: track.id.to_string(),
            title: track.title,
        })
    }

    async fn fetch_audio(&self, link: &str) -> Result<Vec<u8>, ContestError> {
        let track = self.resolve(link).await?;

        // the progressive transcoding is a single downloadable stream
        let transcoding = track
            .media
            .transcodings
            .iter()
            .find(|t| t.format.protocol == "progressive")
            .ok_or_else(|| {
                ContestError::AssetPersistFailed("no downloadable stream for track".to_string())
            })?;

        let location = self
            .http
            .get(&transcoding.url)
            .query(&[("client_id", &self.client_id)])
            .send()
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?
            .json::<StreamLocation>()
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?;

        let bytes = self
            .http
            .get(&location.url)
            .send()
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| ContestError::AssetPersistFailed(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}
