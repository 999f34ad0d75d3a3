//! Verified releases and the merge algorithm that decides whether a new
//! release is published next to, instead of, or not at all beside the
//! releases a slot already has.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use super::error::ReleaseError;
use super::language::Language;
use super::quality::{Resolution, RipType};
use super::track::{AudioTrack, SubtitleTrack};
use super::tracker::Tracker;

/// Inputs for building a [`Release`].
#[derive(Debug, Clone)]
pub struct NewRelease {
    pub id: String,
    pub rip_type: RipType,
    pub resolution: Resolution,
    pub size_bytes: u64,
    pub media_key: String,
    pub tracker: Option<Tracker>,
    pub audio: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
}

/// A downloaded, inspected and classified source for a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Content hash of the torrent the media came from.
    pub id: String,
    pub rip_type: RipType,
    pub resolution: Resolution,
    pub size_bytes: u64,
    /// Object store key of the cached media file.
    pub media_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<Tracker>,
    pub audio: Vec<AudioTrack>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Build a release. Tracks are ordered by stream index and deduplicated;
    /// at least one audio track must remain.
    pub fn new(input: NewRelease) -> Result<Self, ReleaseError> {
        let id = input.id.trim().to_lowercase();
        if id.is_empty() {
            return Err(ReleaseError::Validation("release id is blank".into()));
        }
        if input.media_key.trim().is_empty() {
            return Err(ReleaseError::Validation("media key is blank".into()));
        }

        let mut audio = input.audio;
        audio.sort_by_key(|t| t.index);
        let mut deduped_audio: Vec<AudioTrack> = Vec::with_capacity(audio.len());
        for track in audio {
            if !deduped_audio.iter().any(|t| t.same_identity(&track)) {
                deduped_audio.push(track);
            }
        }
        if deduped_audio.is_empty() {
            return Err(ReleaseError::NoAudio);
        }

        let mut subtitles = input.subtitles;
        subtitles.sort_by_key(|t| t.index);
        let mut deduped_subs: Vec<SubtitleTrack> = Vec::with_capacity(subtitles.len());
        for track in subtitles {
            if !deduped_subs.iter().any(|t| t.same_identity(&track)) {
                deduped_subs.push(track);
            }
        }

        Ok(Self {
            id,
            rip_type: input.rip_type,
            resolution: input.resolution,
            size_bytes: input.size_bytes,
            media_key: input.media_key,
            tracker: input.tracker,
            audio: deduped_audio,
            subtitles: deduped_subs,
            created_at: Utc::now(),
        })
    }

    pub fn audio_languages(&self) -> BTreeSet<Language> {
        self.audio.iter().map(|t| t.language).collect()
    }

    /// Compare two releases for the same slot, `Greater` meaning `self` is
    /// better. `None` means they serve different audiences and are both kept.
    ///
    /// Audio decides first. Releases with equivalent audio fall back to
    /// resolution and then rip type.
    pub fn compare(&self, other: &Release) -> Option<Ordering> {
        let audio = compare_audio(&self.audio, &other.audio)?;
        Some(
            audio
                .then_with(|| self.resolution.cmp(&other.resolution))
                .then_with(|| self.rip_type.cmp(&other.rip_type)),
        )
    }

    /// Resolutions the release should be made available in. Low-quality
    /// rips are capped at HD.
    pub fn target_resolutions(&self) -> Vec<Resolution> {
        let cap = if self.rip_type.is_low_quality() {
            self.resolution.min(Resolution::Hd)
        } else {
            self.resolution
        };
        Resolution::ALL.into_iter().filter(|r| *r <= cap).collect()
    }
}

/// Audio comparison between two track lists.
///
/// The lists are comparable only when one side's languages are a subset of
/// the other's. For every shared language the best track of each side is
/// ranked (voice type, then author). Conflicting per-language results make
/// the pair incomparable. A per-language tie goes to the side leaving fewer
/// of the other side's languages unmatched.
fn compare_audio(a: &[AudioTrack], b: &[AudioTrack]) -> Option<Ordering> {
    let langs_a: BTreeSet<Language> = a.iter().map(|t| t.language).collect();
    let langs_b: BTreeSet<Language> = b.iter().map(|t| t.language).collect();
    if !langs_a.is_subset(&langs_b) && !langs_b.is_subset(&langs_a) {
        return None;
    }

    let best = |tracks: &[AudioTrack], lang: Language| -> Option<AudioTrack> {
        tracks
            .iter()
            .filter(|t| t.language == lang)
            .max_by(|x, y| x.rank_cmp(y))
            .cloned()
    };

    let mut verdict = Ordering::Equal;
    for lang in langs_a.intersection(&langs_b) {
        let (Some(best_a), Some(best_b)) = (best(a, *lang), best(b, *lang)) else {
            continue;
        };
        match (verdict, best_a.rank_cmp(&best_b)) {
            (_, Ordering::Equal) => {}
            (Ordering::Equal, ord) => verdict = ord,
            (current, ord) if current != ord => return None,
            _ => {}
        }
    }
    if verdict != Ordering::Equal {
        return Some(verdict);
    }

    let unmatched_by_a = langs_b.difference(&langs_a).count();
    let unmatched_by_b = langs_a.difference(&langs_b).count();
    Some(unmatched_by_b.cmp(&unmatched_by_a))
}

/// A published release and the ids of every release it superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    pub release: Release,
    #[serde(default)]
    pub replaced_release_ids: BTreeSet<String>,
}

/// Why a new release was not published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// A release with the same id is already published.
    Duplicate,
    /// An existing release is better, or equal and at least as large.
    Dominated { by: String },
}

/// Result of [`merge_release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The release was published. `replaced` holds the removed entries.
    Published { replaced: Vec<ReleaseEntry> },
    Discarded(DiscardReason),
}

impl MergeOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, MergeOutcome::Published { .. })
    }
}

/// Merge a new release into a slot's published releases.
///
/// The new release is discarded if any existing release beats it, or equals
/// it without being smaller. Otherwise every existing release it beats (or
/// equals while being larger) is removed and recorded, together with whatever
/// those had already superseded, under the new entry. Incomparable releases
/// are left alone.
pub fn merge_release(
    releases: &mut BTreeMap<String, ReleaseEntry>,
    release: Release,
) -> MergeOutcome {
    if releases.contains_key(&release.id) {
        return MergeOutcome::Discarded(DiscardReason::Duplicate);
    }

    let mut to_replace = Vec::new();
    for (id, entry) in releases.iter() {
        match release.compare(&entry.release) {
            None => {}
            Some(Ordering::Less) => {
                return MergeOutcome::Discarded(DiscardReason::Dominated { by: id.clone() })
            }
            Some(Ordering::Equal) if release.size_bytes <= entry.release.size_bytes => {
                return MergeOutcome::Discarded(DiscardReason::Dominated { by: id.clone() })
            }
            Some(_) => to_replace.push(id.clone()),
        }
    }

    let mut replaced_ids = BTreeSet::new();
    let mut replaced = Vec::with_capacity(to_replace.len());
    for id in to_replace {
        if let Some(entry) = releases.remove(&id) {
            replaced_ids.extend(entry.replaced_release_ids.iter().cloned());
            replaced_ids.insert(id);
            replaced.push(entry);
        }
    }
    replaced_ids.remove(&release.id);

    releases.insert(
        release.id.clone(),
        ReleaseEntry {
            release,
            replaced_release_ids: replaced_ids,
        },
    );
    MergeOutcome::Published { replaced }
}
