//! Acquisition errors and reports.

use serde::Serialize;
use thiserror::Error;

use super::inspect::InspectionFailure;
use crate::job::JobOutcome;
use crate::object_store::ObjectStoreError;
use crate::prober::ProbeError;
use crate::release::ReleaseError;
use crate::torrent_client::TorrentClientError;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Torrent client error: {0}")]
    TorrentClient(#[from] TorrentClientError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Invalid release: {0}")]
    Release(#[from] ReleaseError),

    #[error("Inspection failed: {0}")]
    Inspection(#[from] InspectionFailure),

    #[error("No matching media file in torrent")]
    NoMatchingFile,

    #[error("Cannot choose a media file: {0}")]
    AmbiguousFiles(String),

    #[error("Timed out waiting for torrent metadata of {0}")]
    MetadataTimeout(String),

    #[error("Torrent {0} has no save path")]
    MissingSavePath(String),
}

impl AcquisitionError {
    /// Errors that make continuing the pass pointless: the torrent daemon
    /// is unreachable or refuses our credentials.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AcquisitionError::TorrentClient(
                TorrentClientError::ConnectionFailed(_) | TorrentClientError::AuthenticationFailed(_)
            )
        )
    }
}

/// Result of one acquisition pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionReport {
    pub outcome: JobOutcome,
    pub promoted: usize,
    pub ignored: usize,
    /// Candidates left in flight (downloading, or paused by the disk gate).
    pub pending: usize,
    /// Releases published into slots.
    pub published: usize,
}

impl Default for AcquisitionReport {
    fn default() -> Self {
        Self {
            outcome: JobOutcome::Completed,
            promoted: 0,
            ignored: 0,
            pending: 0,
            published: 0,
        }
    }
}

/// Where a candidate stands after one step of the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Pending,
    Promoted { published: usize },
    Ignored,
}
