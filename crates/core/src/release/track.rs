//! Classified audio and subtitle tracks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::language::Language;

/// How an audio track was voiced. Declaration order is worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceType {
    /// One voice reads every part.
    SingleVoice,
    /// Two voices (male and female).
    DualVoice,
    /// Several voice actors over the original audio.
    MultiVoice,
    /// Full dub.
    Dub,
    /// The original soundtrack.
    Original,
}

impl VoiceType {
    /// Detect a voice type from a track title.
    pub fn detect(title: &str) -> Option<Self> {
        let lower = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| contains_word(&lower, w));
        if has(&["original", "оригинал", "orig"]) {
            Some(VoiceType::Original)
        } else if has(&["dub", "dubbed", "дубляж", "дублированный", "d"]) {
            Some(VoiceType::Dub)
        } else if has(&["mvo", "multi", "многоголосый", "многоголосая"]) {
            Some(VoiceType::MultiVoice)
        } else if has(&["dvo", "двухголосый", "двухголосая"]) {
            Some(VoiceType::DualVoice)
        } else if has(&["avo", "vo", "одноголосый", "одноголосая", "авторский"]) {
            Some(VoiceType::SingleVoice)
        } else {
            None
        }
    }
}

/// Kind of subtitle track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleType {
    /// Only foreign-language or on-screen text.
    Forced,
    /// Complete dialogue.
    Full,
    /// Dialogue plus sound descriptions.
    Sdh,
}

impl SubtitleType {
    pub fn detect(title: &str) -> Option<Self> {
        let lower = title.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| contains_word(&lower, w));
        if has(&["forced", "форсированные", "надписи"]) {
            Some(SubtitleType::Forced)
        } else if has(&["sdh", "cc", "hearing impaired"]) {
            Some(SubtitleType::Sdh)
        } else if has(&["full", "полные"]) {
            Some(SubtitleType::Full)
        } else {
            None
        }
    }
}

/// Dub studio or fansub group responsible for a track.
///
/// Declaration order is the preference order: earlier is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    LostFilm,
    KubikVKube,
    NewStudio,
    Jaskier,
    RedHeadSound,
    HdRezka,
    AlexFilm,
    Amedia,
    TvShows,
    BaibaKo,
    Pifagor,
    Novamedia,
    Coldfilm,
}

const AUTHORS: [(Author, &[&str]); 13] = [
    (Author::LostFilm, &["lostfilm", "лостфильм"]),
    (Author::KubikVKube, &["кубик в кубе", "kubik v kube", "kubik"]),
    (Author::NewStudio, &["newstudio", "new studio"]),
    (Author::Jaskier, &["jaskier", "яскьер"]),
    (Author::RedHeadSound, &["red head sound", "redheadsound", "rhs"]),
    (Author::HdRezka, &["hdrezka", "rezka", "hdrezka studio"]),
    (Author::AlexFilm, &["alexfilm", "alex film"]),
    (Author::Amedia, &["amedia", "амедиа"]),
    (Author::TvShows, &["tvshows", "tv shows"]),
    (Author::BaibaKo, &["baibako", "байбако"]),
    (Author::Pifagor, &["pifagor", "пифагор"]),
    (Author::Novamedia, &["novamedia", "новамедиа"]),
    (Author::Coldfilm, &["coldfilm", "колдфильм"]),
];

impl Author {
    /// Position in the preference list (0 is best).
    pub fn rank(self) -> usize {
        self as usize
    }

    /// Find the first known author mentioned in a track title.
    pub fn detect(title: &str) -> Option<Self> {
        let lower = title.to_lowercase();
        AUTHORS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_word(&lower, k)))
            .map(|(author, _)| *author)
    }
}

/// Compare authors where a known author beats an unknown one and earlier
/// list entries beat later ones. `Greater` means `a` is preferred.
pub fn compare_authors(a: Option<Author>, b: Option<Author>) -> Ordering {
    let rank = |x: Option<Author>| x.map(Author::rank).unwrap_or(usize::MAX);
    rank(b).cmp(&rank(a))
}

/// Whole-word (or whole-phrase) containment on an already-lowercased string.
pub(crate) fn contains_word(haystack: &str, needle: &str) -> bool {
    let is_boundary = |c: Option<char>| c.is_none_or(|c| !c.is_alphanumeric());
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        is_boundary(before) && is_boundary(after)
    })
}

/// A classified audio stream of a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    /// Stream index inside the container.
    pub index: u32,
    pub language: Language,
    pub voice_type: Option<VoiceType>,
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
}

impl AudioTrack {
    /// Two tracks are duplicates when a viewer could not tell them apart in a
    /// track picker.
    pub fn same_identity(&self, other: &AudioTrack) -> bool {
        self.language == other.language
            && self.voice_type == other.voice_type
            && self.author == other.author
    }

    /// Rank two tracks of the same language by voice type, then author.
    pub fn rank_cmp(&self, other: &AudioTrack) -> Ordering {
        self.voice_type
            .cmp(&other.voice_type)
            .then_with(|| compare_authors(self.author, other.author))
    }
}

/// A classified subtitle stream of a media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub index: u32,
    pub language: Language,
    pub subtitle_type: Option<SubtitleType>,
    pub author: Option<Author>,
}

impl SubtitleTrack {
    pub fn same_identity(&self, other: &SubtitleTrack) -> bool {
        self.language == other.language
            && self.subtitle_type == other.subtitle_type
            && self.author == other.author
    }
}
