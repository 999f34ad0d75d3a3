//! Release value types: ranked enumerations, candidates and verified releases.

mod candidate;
mod error;
mod language;
mod published;
mod quality;
mod track;
mod tracker;

pub use candidate::{
    compare_release_candidates, rank_candidates, CandidateKind, CandidateStatus, NewCandidate,
    ReleaseCandidate, TorrentLocator, TorrentSource,
};
pub use error::ReleaseError;
pub use language::Language;
pub use published::{
    merge_release, DiscardReason, MergeOutcome, NewRelease, Release, ReleaseEntry,
};
pub use quality::{Resolution, RipType};
pub(crate) use track::contains_word;
pub use track::{compare_authors, AudioTrack, Author, SubtitleTrack, SubtitleType, VoiceType};
pub use tracker::Tracker;
