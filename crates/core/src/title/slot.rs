//! Per-slot candidate and release bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::release::{
    merge_release, rank_candidates, CandidateStatus, MergeOutcome, Release, ReleaseCandidate,
    ReleaseEntry,
};

/// Identifies the unit a release belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotKey {
    Movie {
        title_id: String,
    },
    Season {
        title_id: String,
        season: u32,
    },
    Episode {
        title_id: String,
        season: u32,
        episode: u32,
    },
}

impl SlotKey {
    pub fn movie(title_id: impl Into<String>) -> Self {
        SlotKey::Movie {
            title_id: title_id.into(),
        }
    }

    pub fn season(title_id: impl Into<String>, season: u32) -> Self {
        SlotKey::Season {
            title_id: title_id.into(),
            season,
        }
    }

    pub fn episode(title_id: impl Into<String>, season: u32, episode: u32) -> Self {
        SlotKey::Episode {
            title_id: title_id.into(),
            season,
            episode,
        }
    }

    pub fn title_id(&self) -> &str {
        match self {
            SlotKey::Movie { title_id }
            | SlotKey::Season { title_id, .. }
            | SlotKey::Episode { title_id, .. } => title_id,
        }
    }

    pub fn season_number(&self) -> Option<u32> {
        match self {
            SlotKey::Movie { .. } => None,
            SlotKey::Season { season, .. } | SlotKey::Episode { season, .. } => Some(*season),
        }
    }

    /// `titleId[/season[/episode]]`, the object store prefix for this slot.
    pub fn storage_prefix(&self) -> String {
        match self {
            SlotKey::Movie { title_id } => title_id.clone(),
            SlotKey::Season { title_id, season } => format!("{title_id}/{season}"),
            SlotKey::Episode {
                title_id,
                season,
                episode,
            } => format!("{title_id}/{season}/{episode}"),
        }
    }

    /// Prefix under which raw `.torrent` bodies are stored.
    pub fn torrents_prefix(&self) -> String {
        format!("{}/torrents/", self.storage_prefix())
    }

    pub fn torrent_key(&self, hash: &str) -> String {
        format!("{}{}.torrent", self.torrents_prefix(), hash.to_lowercase())
    }

    pub fn media_key(&self, hash: &str, extension: &str) -> String {
        format!(
            "{}/{}.{}",
            self.storage_prefix(),
            hash.to_lowercase(),
            extension.trim_start_matches('.')
        )
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_prefix())
    }
}

/// Discovery progress of a movie or season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryState {
    /// Set once a sweep finds nothing new. Disarms discovery until a rescan
    /// is requested and allows the candidate map to be reset.
    #[serde(default)]
    pub ready_to_process: bool,
    /// Guids already examined since the slot was last marked ready.
    #[serde(default)]
    pub seen_guids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sweep_at: Option<DateTime<Utc>>,
}

impl DiscoveryState {
    pub fn mark_ready(&mut self) {
        self.ready_to_process = true;
        self.seen_guids.clear();
    }

    pub fn request_rescan(&mut self) {
        self.ready_to_process = false;
    }
}

/// Candidates, releases and the decision ledger of one slot.
///
/// Candidate keys are lowercase info hashes and never overlap with release
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    #[serde(default)]
    release_candidates: BTreeMap<String, ReleaseCandidate>,
    #[serde(default)]
    releases: BTreeMap<String, ReleaseEntry>,
    #[serde(default)]
    blacklist: BTreeSet<String>,
    #[serde(default)]
    whitelist: BTreeSet<String>,
}

impl SlotState {
    /// Store a new candidate. Returns `false` when the hash (in any letter
    /// case) is already a candidate or a published release.
    pub fn add_candidate(&mut self, candidate: ReleaseCandidate) -> bool {
        if self.knows(&candidate.id) {
            return false;
        }
        self.release_candidates
            .insert(candidate.id.to_lowercase(), candidate);
        true
    }

    /// Whether the hash is already a candidate or a published release.
    pub fn knows(&self, id: &str) -> bool {
        let key = id.to_lowercase();
        self.release_candidates.contains_key(&key) || self.releases.contains_key(&key)
    }

    pub fn contains_candidate(&self, id: &str) -> bool {
        self.release_candidates.contains_key(&id.to_lowercase())
    }

    pub fn candidate(&self, id: &str) -> Option<&ReleaseCandidate> {
        self.release_candidates.get(&id.to_lowercase())
    }

    pub fn candidates(&self) -> impl Iterator<Item = &ReleaseCandidate> {
        self.release_candidates.values()
    }

    /// Candidates best first.
    pub fn ranked_candidates(&self) -> Vec<ReleaseCandidate> {
        let mut list: Vec<_> = self.release_candidates.values().cloned().collect();
        rank_candidates(&mut list);
        list
    }

    pub fn has_candidates(&self) -> bool {
        !self.release_candidates.is_empty()
    }

    pub fn all_candidates_resolved(&self) -> bool {
        self.release_candidates.values().all(|c| c.is_resolved())
    }

    /// Resolve a candidate and record the decision in the ledger.
    /// Returns `false` if the candidate is unknown or was already resolved.
    pub fn resolve_candidate(&mut self, id: &str, outcome: CandidateStatus) -> bool {
        let key = id.to_lowercase();
        let changed = match self.release_candidates.get_mut(&key) {
            Some(candidate) => candidate.resolve(outcome),
            None => false,
        };
        if changed {
            self.record_decision(&key, outcome);
        }
        changed
    }

    /// Idempotent ledger insertion.
    pub fn record_decision(&mut self, id: &str, outcome: CandidateStatus) {
        let key = id.to_lowercase();
        match outcome {
            CandidateStatus::Promoted => {
                self.whitelist.insert(key);
            }
            CandidateStatus::Ignored => {
                self.blacklist.insert(key);
            }
            CandidateStatus::Unprocessed => {}
        }
    }

    /// Decision recorded for a candidate id in a previous run.
    pub fn prior_decision(&self, id: &str) -> Option<CandidateStatus> {
        let key = id.to_lowercase();
        if self.whitelist.contains(&key) {
            Some(CandidateStatus::Promoted)
        } else if self.blacklist.contains(&key) {
            Some(CandidateStatus::Ignored)
        } else {
            None
        }
    }

    /// Empty the candidate map, returning the removed candidates.
    pub fn reset_candidates(&mut self) -> Vec<ReleaseCandidate> {
        std::mem::take(&mut self.release_candidates)
            .into_values()
            .collect()
    }

    pub fn releases(&self) -> &BTreeMap<String, ReleaseEntry> {
        &self.releases
    }

    /// Merge a verified release into this slot.
    pub fn publish(&mut self, release: Release) -> MergeOutcome {
        merge_release(&mut self.releases, release)
    }

    /// Remove a published release (administrative deletion).
    pub fn remove_release(&mut self, id: &str) -> Option<ReleaseEntry> {
        self.releases.remove(&id.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_storage_paths() {
        let movie = SlotKey::movie("m1");
        assert_eq!(movie.storage_prefix(), "m1");
        assert_eq!(movie.torrent_key("ABC"), "m1/torrents/abc.torrent");
        assert_eq!(movie.media_key("abc", ".mkv"), "m1/abc.mkv");

        let episode = SlotKey::episode("s1", 2, 5);
        assert_eq!(episode.storage_prefix(), "s1/2/5");
        assert_eq!(episode.media_key("abc", "mp4"), "s1/2/5/abc.mp4");
        assert_eq!(SlotKey::season("s1", 2).torrents_prefix(), "s1/2/torrents/");
        assert_eq!(episode.season_number(), Some(2));
        assert_eq!(movie.season_number(), None);
    }

    #[test]
    fn test_add_candidate_is_case_insensitive() {
        let mut slot = SlotState::default();
        let lower = fixtures::candidate(&"ab".repeat(20));
        let upper = fixtures::candidate(&"AB".repeat(20));
        assert!(slot.add_candidate(lower));
        assert!(!slot.add_candidate(upper));
        assert_eq!(slot.candidates().count(), 1);
        assert!(slot.contains_candidate(&"AB".repeat(20)));
    }

    #[test]
    fn test_candidate_and_release_keys_disjoint() {
        let mut slot = SlotState::default();
        let hash = "cd".repeat(20);
        slot.publish(fixtures::release(&hash));
        assert!(!slot.add_candidate(fixtures::candidate(&hash)));
    }

    #[test]
    fn test_resolve_records_ledger_once() {
        let mut slot = SlotState::default();
        let hash = "ef".repeat(20);
        slot.add_candidate(fixtures::candidate(&hash));
        assert!(!slot.all_candidates_resolved());

        assert!(slot.resolve_candidate(&hash, CandidateStatus::Ignored));
        assert!(!slot.resolve_candidate(&hash, CandidateStatus::Promoted));
        assert_eq!(slot.prior_decision(&hash), Some(CandidateStatus::Ignored));
        assert!(slot.all_candidates_resolved());

        // Ledger survives a reset.
        assert_eq!(slot.reset_candidates().len(), 1);
        assert!(!slot.has_candidates());
        assert_eq!(slot.prior_decision(&hash.to_uppercase()), Some(CandidateStatus::Ignored));
    }

    #[test]
    fn test_discovery_state_ready_clears_guids() {
        let mut state = DiscoveryState::default();
        state.seen_guids.insert("g1".into());
        state.mark_ready();
        assert!(state.ready_to_process);
        assert!(state.seen_guids.is_empty());
        state.request_rescan();
        assert!(!state.ready_to_process);
    }
}
