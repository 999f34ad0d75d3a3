//! Release candidates discovered on indexers and their ranking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};

use super::error::ReleaseError;
use super::language::Language;
use super::quality::{Resolution, RipType};
use super::tracker::Tracker;

/// Processing state of a candidate. Moves out of `Unprocessed` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    #[default]
    Unprocessed,
    /// Acquired and published as a release.
    Promoted,
    /// Discarded (lost a comparison, stalled, failed inspection...).
    Ignored,
}

impl CandidateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CandidateStatus::Unprocessed)
    }
}

/// Where the torrent metadata can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentLocator {
    Magnet { uri: String },
    /// A `.torrent` file kept in the object store.
    StoredFile { key: String },
}

/// Torrent-specific candidate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSource {
    /// Lowercase hex info hash.
    pub info_hash: String,
    pub locator: TorrentLocator,
    pub seeders: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
}

/// Acquisition transport of a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateKind {
    Torrent(TorrentSource),
}

/// Inputs for building a [`ReleaseCandidate`].
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub guid: String,
    pub title: String,
    pub rip_type: RipType,
    pub resolution: Resolution,
    /// Reported size; indexers report signed values.
    pub size_bytes: Option<i64>,
    pub release_time: Option<DateTime<Utc>>,
    pub tracker: Tracker,
    pub languages: Vec<Language>,
    /// Raw language hints that did not resolve to a [`Language`].
    pub language_hints: Vec<String>,
    pub unknown_title: bool,
    pub source: TorrentSource,
}

/// A discovered, not-yet-verified release option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCandidate {
    /// Content-derived identifier (the lowercase info hash).
    pub id: String,
    pub guid: String,
    pub title: String,
    pub rip_type: RipType,
    pub resolution: Resolution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_time: Option<DateTime<Utc>>,
    pub tracker: Tracker,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub language_hints: Vec<String>,
    #[serde(default)]
    pub unknown_title: bool,
    #[serde(default)]
    pub status: CandidateStatus,
    pub kind: CandidateKind,
}

impl ReleaseCandidate {
    /// Validate and build an unprocessed torrent candidate.
    pub fn new(input: NewCandidate) -> Result<Self, ReleaseError> {
        let hash = input.source.info_hash.trim().to_lowercase();
        if hash.is_empty() {
            return Err(ReleaseError::Validation("candidate id is blank".into()));
        }
        if hash.len() != 40 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReleaseError::Validation(format!(
                "invalid info hash: {hash}"
            )));
        }
        let size_bytes = match input.size_bytes {
            Some(size) if size < 0 => {
                return Err(ReleaseError::Validation(format!("negative size: {size}")))
            }
            Some(0) | None => None,
            Some(size) => Some(size as u64),
        };
        match &input.source.locator {
            TorrentLocator::Magnet { uri } if !uri.starts_with("magnet:") => {
                return Err(ReleaseError::Validation(format!("not a magnet uri: {uri}")))
            }
            TorrentLocator::StoredFile { key } if key.trim().is_empty() => {
                return Err(ReleaseError::Validation("stored torrent key is blank".into()))
            }
            _ => {}
        }

        Ok(Self {
            id: hash.clone(),
            guid: input.guid,
            title: input.title,
            rip_type: input.rip_type,
            resolution: input.resolution,
            size_bytes,
            release_time: input.release_time,
            tracker: input.tracker,
            languages: input.languages,
            language_hints: input.language_hints,
            unknown_title: input.unknown_title,
            status: CandidateStatus::Unprocessed,
            kind: CandidateKind::Torrent(TorrentSource {
                info_hash: hash,
                ..input.source
            }),
        })
    }

    pub fn torrent(&self) -> &TorrentSource {
        match &self.kind {
            CandidateKind::Torrent(source) => source,
        }
    }

    pub fn seeders(&self) -> u32 {
        self.torrent().seeders
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record the processing outcome. Returns `false` (and changes nothing)
    /// if the candidate was already resolved or `outcome` is not terminal.
    pub fn resolve(&mut self, outcome: CandidateStatus) -> bool {
        if self.status.is_terminal() || !outcome.is_terminal() {
            return false;
        }
        self.status = outcome;
        true
    }
}

/// Size ratio above which the larger of two Blu-ray rips wins outright.
const BLURAY_SIZE_RATIO: u64 = 2;

/// Pairwise preference between two candidates, `Greater` meaning `a` is the
/// better pick.
///
/// A missing candidate always loses. Cam-tier rips lose to anything that is
/// not cam-tier. Otherwise resolution decides, then rip type. Blu-ray rips
/// more than twice the size of the other win outright, otherwise seeders and
/// then size decide. Remaining ties go to the earlier release time; unknown
/// times compare equal.
pub fn compare_release_candidates(
    a: Option<&ReleaseCandidate>,
    b: Option<&ReleaseCandidate>,
) -> Ordering {
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (Some(_), None) => return Ordering::Greater,
        (None, Some(_)) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };

    match (a.rip_type.is_low_quality(), b.rip_type.is_low_quality()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let by_quality = a
        .resolution
        .cmp(&b.resolution)
        .then_with(|| a.rip_type.cmp(&b.rip_type));
    if by_quality != Ordering::Equal {
        return by_quality;
    }

    let by_availability = if a.rip_type == RipType::Br {
        compare_bluray(a, b)
    } else {
        a.seeders().cmp(&b.seeders())
    };
    if by_availability != Ordering::Equal {
        return by_availability;
    }

    match (a.release_time, b.release_time) {
        // Earlier wins.
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        _ => Ordering::Equal,
    }
}

fn compare_bluray(a: &ReleaseCandidate, b: &ReleaseCandidate) -> Ordering {
    if let (Some(sa), Some(sb)) = (a.size_bytes, b.size_bytes) {
        if sa > sb.saturating_mul(BLURAY_SIZE_RATIO) {
            return Ordering::Greater;
        }
        if sb > sa.saturating_mul(BLURAY_SIZE_RATIO) {
            return Ordering::Less;
        }
    }
    a.seeders()
        .cmp(&b.seeders())
        .then_with(|| a.size_bytes.cmp(&b.size_bytes))
}

/// Sort key for [`rank_candidates`]; larger ranks first.
type RankKey = (
    bool,
    Resolution,
    RipType,
    u32,
    Option<u64>,
    Option<Reverse<DateTime<Utc>>>,
);

fn rank_key(c: &ReleaseCandidate) -> RankKey {
    // Size only breaks seeder ties between Blu-ray rips.
    let size = (c.rip_type == RipType::Br).then_some(c.size_bytes).flatten();
    (
        !c.rip_type.is_low_quality(),
        c.resolution,
        c.rip_type,
        c.seeders(),
        size,
        c.release_time.map(Reverse),
    )
}

/// Whether Blu-ray rip `a` is more than twice the size of `b` at the same
/// resolution.
fn outsizes(a: &ReleaseCandidate, b: &ReleaseCandidate) -> bool {
    if a.rip_type != RipType::Br || b.rip_type != RipType::Br || a.resolution != b.resolution {
        return false;
    }
    matches!(
        (a.size_bytes, b.size_bytes),
        (Some(sa), Some(sb)) if sa > sb.saturating_mul(BLURAY_SIZE_RATIO)
    )
}

/// Sort candidates best first.
///
/// The sort uses a total key: cam tier, resolution, rip type, seeders (then
/// size for Blu-ray), earlier release time with unknown times last, and id.
/// A Blu-ray rip more than twice the size of the one ranked above it is then
/// moved ahead of it.
pub fn rank_candidates(candidates: &mut [ReleaseCandidate]) {
    candidates.sort_by(|a, b| {
        rank_key(b)
            .cmp(&rank_key(a))
            .then_with(|| a.id.cmp(&b.id))
    });

    for i in 1..candidates.len() {
        let mut j = i;
        while j > 0 && outsizes(&candidates[j], &candidates[j - 1]) {
            candidates.swap(j, j - 1);
            j -= 1;
        }
    }
}
