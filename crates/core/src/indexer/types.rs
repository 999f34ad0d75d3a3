//! Indexer descriptor types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transfer protocol a release is offered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Torrent,
    Usenet,
    #[serde(other)]
    Unknown,
}

/// A raw release descriptor as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerRelease {
    pub guid: String,
    /// Free-text release title.
    pub title: String,
    pub protocol: Protocol,
    /// Quality name such as `Bluray-1080p`.
    pub quality_name: String,
    /// Declared vertical resolution in pixels.
    pub resolution_hint: Option<u32>,
    pub age_seconds: Option<u64>,
    pub size_bytes: Option<i64>,
    pub seeders: Option<u32>,
    pub custom_format_score: i32,
    /// Declared language names.
    pub languages: Vec<String>,
    pub download_url: Option<String>,
    pub magnet_url: Option<String>,
    pub info_hash: Option<String>,
    pub indexer_name: Option<String>,
    pub info_url: Option<String>,
    pub comment_url: Option<String>,
    /// The indexer could not map the release to the requested title.
    pub unknown_title: bool,
}

/// Errors that can occur when querying the indexer.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Indexer not configured: {0}")]
    NotConfigured(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error: {0}")]
    ApiError(String),
}

/// Source of release descriptors for a title.
#[async_trait]
pub trait IndexerService: Send + Sync {
    /// Fetch every release the indexer currently knows for a title. `season`
    /// selects a season of a show; `None` means a movie.
    async fn get_releases(
        &self,
        title_indexer_id: i64,
        season: Option<u32>,
    ) -> Result<Vec<IndexerRelease>, IndexerError>;
}
