//! Audio and subtitle stream classification.
//!
//! Probed streams carry a language code and a free-text title at best; this
//! module turns them into [`AudioTrack`]s and [`SubtitleTrack`]s. Streams
//! whose language cannot be resolved are dropped.

use crate::prober::{ProbeResult, ProbeStream, StreamKind};
use crate::release::{
    contains_word, AudioTrack, Author, Language, SubtitleTrack, SubtitleType, Tracker, VoiceType,
};

/// Subtitle codecs the player can render.
const SUPPORTED_SUBTITLE_CODECS: &[&str] = &["subrip", "srt", "ass", "ssa", "mov_text", "webvtt"];

const LATIN_AMERICAN_MARKERS: &[&str] = &["latino", "latin", "lat", "latam", "latinoamérica"];
const BRAZILIAN_MARKERS: &[&str] = &["brazil", "brazilian", "brasil", "br"];
const COMMENTARY_MARKERS: &[&str] = &["commentary", "comments", "комментарий", "комментарии"];

/// Title-level facts the heuristics depend on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    pub original_language: Option<Language>,
    pub tracker: Option<Tracker>,
}

/// Tracks that survived classification, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedStreams {
    pub audio: Vec<AudioTrack>,
    pub subtitles: Vec<SubtitleTrack>,
}

pub fn classify_streams(probe: &ProbeResult, ctx: &ClassifyContext) -> ClassifiedStreams {
    ClassifiedStreams {
        audio: probe
            .streams_of(StreamKind::Audio)
            .filter_map(|s| classify_audio(s, ctx))
            .collect(),
        subtitles: probe
            .streams_of(StreamKind::Subtitle)
            .filter_map(|s| classify_subtitle(s, ctx))
            .collect(),
    }
}

pub fn classify_audio(stream: &ProbeStream, ctx: &ClassifyContext) -> Option<AudioTrack> {
    if is_commentary(stream) {
        return None;
    }
    let title = stream.title.as_deref().unwrap_or_default();
    let language = resolve_language(stream.language.as_deref(), title, ctx.original_language)?;

    Some(AudioTrack {
        index: stream.index,
        language,
        voice_type: resolve_voice_type(title, language, ctx),
        author: Author::detect(title),
        channels: stream.channels,
        bitrate: stream.bitrate,
    })
}

pub fn classify_subtitle(stream: &ProbeStream, ctx: &ClassifyContext) -> Option<SubtitleTrack> {
    let codec = stream.codec_name.as_deref()?.to_lowercase();
    if !SUPPORTED_SUBTITLE_CODECS.contains(&codec.as_str()) || is_commentary(stream) {
        return None;
    }
    let title = stream.title.as_deref().unwrap_or_default();
    let language = resolve_language(stream.language.as_deref(), title, ctx.original_language)?;

    let subtitle_type = if stream.disposition.forced {
        Some(SubtitleType::Forced)
    } else if stream.disposition.hearing_impaired {
        Some(SubtitleType::Sdh)
    } else {
        SubtitleType::detect(title)
    };

    Some(SubtitleTrack {
        index: stream.index,
        language,
        subtitle_type,
        author: Author::detect(title),
    })
}

/// Resolve a track language from its code, falling back to a language name
/// in the title. Regional variants are inferred from title markers and from
/// the title's original language.
pub fn resolve_language(
    code: Option<&str>,
    title: &str,
    original: Option<Language>,
) -> Option<Language> {
    let language = code
        .and_then(Language::from_code)
        .or_else(|| language_from_title(title))?;

    let lower = title.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| contains_word(&lower, m));
    let language = match language {
        Language::Es if has(LATIN_AMERICAN_MARKERS) => Language::Es419,
        Language::Pt if has(BRAZILIAN_MARKERS) => Language::PtBr,
        other => other,
    };
    Some(language.specialize_for(original))
}

fn language_from_title(title: &str) -> Option<Language> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .find_map(Language::from_name)
}

/// Voice type from title keywords. Untagged tracks in the original language
/// are the original soundtrack, as are untagged foreign tracks on
/// Russian-community trackers, which only tag their own voice-overs.
fn resolve_voice_type(title: &str, language: Language, ctx: &ClassifyContext) -> Option<VoiceType> {
    if let Some(voice) = VoiceType::detect(title) {
        return Some(voice);
    }
    if ctx
        .original_language
        .is_some_and(|orig| orig.base() == language.base())
    {
        return Some(VoiceType::Original);
    }
    let russian_community = ctx.tracker.is_some_and(Tracker::is_russian_community);
    if russian_community && !matches!(language, Language::Ru | Language::Uk) {
        return Some(VoiceType::Original);
    }
    None
}

fn is_commentary(stream: &ProbeStream) -> bool {
    if stream.disposition.comment {
        return true;
    }
    let lower = stream.title.as_deref().unwrap_or_default().to_lowercase();
    COMMENTARY_MARKERS.iter().any(|m| contains_word(&lower, m))
}
