//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    /// Fetching metadata for a magnet link.
    FetchingMetadata,
    /// Downloading from peers.
    Downloading,
    /// Seeding to peers.
    Seeding,
    /// Download or upload is paused.
    Paused,
    /// Checking file integrity.
    Checking,
    /// Queued for download.
    Queued,
    /// Stalled (no peers).
    Stalled,
    /// Error state.
    Error,
    /// Unknown state.
    Unknown,
}

impl TorrentState {
    /// Returns the string representation for logs and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::FetchingMetadata => "fetching_metadata",
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Information about a torrent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    pub state: TorrentState,
    /// Download progress of the selected files (0.0 - 1.0).
    pub progress: f64,
    /// Size of the selected files in bytes.
    pub size_bytes: u64,
    /// ETA in seconds (None if unknown or complete).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<u64>,
    /// When the torrent was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    /// Save path on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TorrentInfo {
    pub fn is_stalled(&self) -> bool {
        self.state == TorrentState::Stalled
    }
}

/// Download priority of a file inside a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download.
    Skip,
    Normal,
    High,
}

impl FilePriority {
    /// qBittorrent numeric priority.
    pub fn as_qb(self) -> u8 {
        match self {
            FilePriority::Skip => 0,
            FilePriority::Normal => 1,
            FilePriority::High => 6,
        }
    }

    pub fn from_qb(value: i64) -> Self {
        match value {
            0 => FilePriority::Skip,
            v if v >= 6 => FilePriority::High,
            _ => FilePriority::Normal,
        }
    }
}

/// A file inside a torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Index of the file within the torrent.
    pub index: u32,
    /// Path relative to the torrent root.
    pub name: String,
    pub size_bytes: u64,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    pub priority: FilePriority,
}

impl TorrentFile {
    /// Bytes still missing for this file.
    pub fn remaining_bytes(&self) -> u64 {
        let done = (self.size_bytes as f64 * self.progress.clamp(0.0, 1.0)) as u64;
        self.size_bytes.saturating_sub(done)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }
}

/// Request to add a new torrent.
#[derive(Debug, Clone)]
pub enum AddTorrentRequest {
    /// Add via magnet URI.
    Magnet {
        uri: String,
        /// Optional download path override.
        download_path: Option<String>,
        tags: Vec<String>,
        /// Start paused.
        paused: bool,
    },
    /// Add via .torrent file contents.
    TorrentFile {
        /// Raw .torrent file bytes.
        data: Vec<u8>,
        /// Original filename (for logging).
        filename: Option<String>,
        download_path: Option<String>,
        tags: Vec<String>,
        paused: bool,
    },
}

impl AddTorrentRequest {
    /// Create a magnet request with default options.
    pub fn magnet(uri: impl Into<String>) -> Self {
        AddTorrentRequest::Magnet {
            uri: uri.into(),
            download_path: None,
            tags: Vec::new(),
            paused: false,
        }
    }

    /// Create a torrent file request with default options.
    pub fn torrent_file(data: Vec<u8>) -> Self {
        AddTorrentRequest::TorrentFile {
            data,
            filename: None,
            download_path: None,
            tags: Vec::new(),
            paused: false,
        }
    }

    /// Set the download path.
    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        match &mut self {
            AddTorrentRequest::Magnet { download_path, .. }
            | AddTorrentRequest::TorrentFile { download_path, .. } => {
                *download_path = Some(path.into());
            }
        }
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        match &mut self {
            AddTorrentRequest::Magnet { tags, .. } | AddTorrentRequest::TorrentFile { tags, .. } => {
                tags.push(tag.into());
            }
        }
        self
    }

    /// Set whether to start paused.
    pub fn with_paused(mut self, p: bool) -> Self {
        match &mut self {
            AddTorrentRequest::Magnet { paused, .. }
            | AddTorrentRequest::TorrentFile { paused, .. } => {
                *paused = p;
            }
        }
        self
    }

    pub fn is_magnet(&self) -> bool {
        matches!(self, AddTorrentRequest::Magnet { .. })
    }

    pub fn tags(&self) -> &[String] {
        match self {
            AddTorrentRequest::Magnet { tags, .. } | AddTorrentRequest::TorrentFile { tags, .. } => {
                tags
            }
        }
    }
}

/// Result of adding a torrent.
#[derive(Debug, Clone)]
pub struct AddTorrentResult {
    /// Info hash of the added torrent (lowercase hex).
    pub hash: String,
}

/// Trait for torrent client implementations.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError>;

    /// Fails with [`TorrentClientError::TorrentNotFound`] when no session exists.
    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError>;

    /// Files of a torrent. Empty while magnet metadata is still being fetched.
    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError>;

    async fn set_file_priority(
        &self,
        hash: &str,
        file_indexes: &[u32],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError>;

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    async fn remove_torrent(&self, hash: &str, delete_files: bool)
        -> Result<(), TorrentClientError>;

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError>;

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError>;

    /// Estimated free space on the download volume in bytes.
    async fn free_space(&self) -> Result<u64, TorrentClientError>;
}
