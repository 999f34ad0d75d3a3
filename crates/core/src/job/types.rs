//! Job payloads, wall-clock budget and job errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::acquisition::AcquisitionError;
use crate::discovery::DiscoveryError;
use crate::title::{SlotKey, Title, TitleStoreError};

/// Payload of a job invocation: a movie, a season or an episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub title_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<u32>,
}

impl JobRequest {
    pub fn title(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            season_number: None,
            episode_number: None,
        }
    }

    pub fn season(title_id: impl Into<String>, season: u32) -> Self {
        Self {
            season_number: Some(season),
            ..Self::title(title_id)
        }
    }

    pub fn episode(title_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            season_number: Some(season),
            episode_number: Some(episode),
            ..Self::title(title_id)
        }
    }

    /// Resolve the slot this request targets on `title`.
    pub fn slot_key(&self, title: &Title) -> Result<SlotKey, JobError> {
        let key = match (self.season_number, self.episode_number) {
            (None, None) if title.is_movie() => SlotKey::movie(&title.id),
            (None, None) => {
                return Err(JobError::InvalidRequest(format!(
                    "{} is a show, a season number is required",
                    title.id
                )))
            }
            (Some(season), None) => SlotKey::season(&title.id, season),
            (Some(season), Some(episode)) => SlotKey::episode(&title.id, season, episode),
            (None, Some(_)) => {
                return Err(JobError::InvalidRequest(
                    "episodeNumber requires seasonNumber".to_string(),
                ))
            }
        };
        if !title.has_slot(&key) {
            return Err(JobError::SlotNotFound(key.to_string()));
        }
        Ok(key)
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Completed,
    /// The budget ran out; progress was persisted and a later run resumes.
    Partial,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Partial => "partial",
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock budget of a job, checked between units of work.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// A deadline that has already passed.
    pub fn expired_now() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        self.started.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Title not found: {0}")]
    TitleNotFound(String),

    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Invalid job request: {0}")]
    InvalidRequest(String),

    #[error("Title store error: {0}")]
    Store(#[from] TitleStoreError),

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),
}

impl JobError {
    /// Whether the error names a title or slot that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::TitleNotFound(_) | JobError::SlotNotFound(_))
    }
}
