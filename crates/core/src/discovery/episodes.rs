//! Episode scope extraction from free-text release titles.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// What part of a season a release covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpisodeScope {
    WholeSeason,
    Episodes(Vec<u32>),
}

// Patterns run against the lowercased title.
static SEASON_RANGE: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?:^|[^a-z0-9])s(\d{1,2})\s*-\s*s?(\d{1,2})(?:[^0-9e]|$)").unwrap(),
        Regex::new(r"seasons?\s*(\d{1,2})\s*-\s*(\d{1,2})").unwrap(),
        Regex::new(r"сезон[ыа]?:?\s*(\d{1,2})\s*-\s*(\d{1,2})").unwrap(),
    ]
});

static EPISODE_RANGE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"s(\d{1,2})\s*e(\d{1,3})\s*-\s*(?:s\d{1,2}\s*)?e?(\d{1,3})").unwrap(),
        Regex::new(r"s(\d{1,2})\s*e(\d{1,3})\s*e(\d{1,3})").unwrap(),
    ]
});

/// Episode ranges that carry no season number of their own.
static BARE_EPISODE_RANGE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"сери[ияй]:?\s*(\d{1,3})\s*-\s*(\d{1,3})").unwrap(),
        Regex::new(r"\[(\d{1,3})\s*-\s*(\d{1,3})\s*из\s*\d{1,3}\]").unwrap(),
    ]
});

static SINGLE_EPISODE: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"s(\d{1,2})\s*e(\d{1,3})").unwrap(),
        Regex::new(r"(?:^|[^a-z0-9])(\d{1,2})x(\d{2,3})(?:[^0-9]|$)").unwrap(),
    ]
});

static SEASON_ONLY: Lazy<[Regex; 4]> = Lazy::new(|| {
    [
        Regex::new(r"(?:^|[^a-z0-9])s(\d{1,2})(?:[^0-9e]|$)").unwrap(),
        Regex::new(r"season\s*(\d{1,2})").unwrap(),
        Regex::new(r"сезон:?\s*(\d{1,2})").unwrap(),
        Regex::new(r"(\d{1,2})\s*сезон").unwrap(),
    ]
});

/// Episode marker in a file name, used to map season-pack files to episodes.
static FILE_EPISODE: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"s\d{1,2}\s*e(\d{1,3})").unwrap(),
        Regex::new(r"(?:^|[^a-z0-9])\d{1,2}x(\d{2,3})(?:[^0-9]|$)").unwrap(),
        Regex::new(r"(?:^|[^a-z0-9])(?:e|ep|episode|серия)\s*(\d{1,3})(?:[^0-9]|$)").unwrap(),
    ]
});

fn number(caps: &regex_lite::Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)?.as_str().parse().ok()
}

fn range(start: u32, end: u32) -> Vec<u32> {
    if start <= end {
        (start..=end).collect()
    } else {
        (end..=start).collect()
    }
}

/// Determine which episodes of `season` a release title covers.
///
/// Returns `None` when the title explicitly targets other seasons. Titles
/// without any marker are treated as whole-season packs since the indexer
/// was queried for this season.
pub fn extract_episode_scope(release_title: &str, season: u32) -> Option<EpisodeScope> {
    let text = release_title.to_lowercase();

    for re in SEASON_RANGE.iter() {
        if let Some(caps) = re.captures(&text) {
            let (from, to) = (number(&caps, 1)?, number(&caps, 2)?);
            return range(from, to)
                .contains(&season)
                .then_some(EpisodeScope::WholeSeason);
        }
    }

    for re in EPISODE_RANGE.iter() {
        if let Some(caps) = re.captures(&text) {
            if number(&caps, 1)? != season {
                return None;
            }
            return Some(EpisodeScope::Episodes(range(
                number(&caps, 2)?,
                number(&caps, 3)?,
            )));
        }
    }

    for re in BARE_EPISODE_RANGE.iter() {
        if let Some(caps) = re.captures(&text) {
            return Some(EpisodeScope::Episodes(range(
                number(&caps, 1)?,
                number(&caps, 2)?,
            )));
        }
    }

    for re in SINGLE_EPISODE.iter() {
        if let Some(caps) = re.captures(&text) {
            if number(&caps, 1)? != season {
                return None;
            }
            return Some(EpisodeScope::Episodes(vec![number(&caps, 2)?]));
        }
    }

    for re in SEASON_ONLY.iter() {
        if let Some(caps) = re.captures(&text) {
            return (number(&caps, 1)? == season).then_some(EpisodeScope::WholeSeason);
        }
    }

    Some(EpisodeScope::WholeSeason)
}

/// Episode number marked in a file name, if any.
pub fn episode_in_file_name(name: &str) -> Option<u32> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).to_lowercase();
    FILE_EPISODE
        .iter()
        .find_map(|re| re.captures(&base).and_then(|caps| number(&caps, 1)))
}

/// Lowercase, turn separators into single spaces.
pub fn normalize_title(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the release title begins with one of the known name variants.
pub fn matches_name_variant(release_title: &str, names: &[String]) -> bool {
    let normalized = normalize_title(release_title);
    names.iter().map(|n| normalize_title(n)).any(|name| {
        !name.is_empty()
            && normalized.starts_with(&name)
            && normalized[name.len()..]
                .chars()
                .next()
                .is_none_or(|c| c == ' ')
    })
}
