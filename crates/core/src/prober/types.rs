//! Probe result types and the prober trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while probing a media file.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe not found at path: {path}")]
    ProberNotFound { path: PathBuf },

    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Probe failed: {reason}")]
    Failed { reason: String },

    #[error("Failed to parse probe output: {reason}")]
    Parse { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of a media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[serde(other)]
    Other,
}

/// Disposition flags reported for a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDisposition {
    pub default: bool,
    pub forced: bool,
    pub comment: bool,
    pub hearing_impaired: bool,
}

/// One stream of a probed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeStream {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub channels: Option<u32>,
    pub bitrate: Option<u64>,
    /// Raw `language` tag (ISO 639 code or free text).
    pub language: Option<String>,
    /// Raw `title` tag.
    pub title: Option<String>,
    #[serde(default)]
    pub disposition: StreamDisposition,
}

impl ProbeStream {
    pub fn is_video(&self) -> bool {
        self.kind == StreamKind::Video
    }
}

/// Result of probing a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    /// Streams in container order.
    pub streams: Vec<ProbeStream>,
}

impl ProbeResult {
    pub fn first_stream_is_video(&self) -> bool {
        self.streams.first().is_some_and(ProbeStream::is_video)
    }

    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &ProbeStream> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }
}

/// Extracts stream metadata from media files.
#[async_trait]
pub trait MediaProber: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError>;
}
