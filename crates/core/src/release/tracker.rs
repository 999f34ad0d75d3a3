//! Known torrent trackers and how to recognize them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::language::Language;

/// A tracker a release candidate was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracker {
    Rutracker,
    Kinozal,
    Rutor,
    NnmClub,
    LostFilm,
    Toloka,
    TorrentGalaxy,
    ThePirateBay,
    Yts,
    Eztv,
    X1337,
    Nyaa,
}

struct TrackerInfo {
    tracker: Tracker,
    key: &'static str,
    /// Host suffixes of info/comment URLs.
    hosts: &'static [&'static str],
    /// Normalized indexer names (lowercase, alphanumeric only).
    aliases: &'static [&'static str],
    /// Releases here carry a single audience language.
    language: Option<Language>,
    /// Russian-speaking community tracker.
    russian_community: bool,
    /// Publish dates reported for this tracker cannot be trusted.
    unreliable_age: bool,
}

const TRACKERS: [TrackerInfo; 12] = [
    TrackerInfo {
        tracker: Tracker::Rutracker,
        key: "rutracker",
        hosts: &["rutracker.org", "rutracker.net", "rutracker.nl"],
        aliases: &["rutracker", "rutrackerorg", "rutrackerru"],
        language: None,
        russian_community: true,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::Kinozal,
        key: "kinozal",
        hosts: &["kinozal.tv", "kinozal.me", "kinozal.guru"],
        aliases: &["kinozal", "kinozaltv"],
        language: None,
        russian_community: true,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::Rutor,
        key: "rutor",
        hosts: &["rutor.info", "rutor.is", "rutor.org"],
        aliases: &["rutor", "rutorinfo"],
        language: None,
        russian_community: true,
        unreliable_age: true,
    },
    TrackerInfo {
        tracker: Tracker::NnmClub,
        key: "nnmclub",
        hosts: &["nnmclub.to", "nnm-club.me", "nnm-club.ws"],
        aliases: &["nnmclub", "nnmclubto"],
        language: None,
        russian_community: true,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::LostFilm,
        key: "lostfilm",
        hosts: &["lostfilm.tv", "lostfilm.win", "lostfilm.today"],
        aliases: &["lostfilm", "lostfilmtv"],
        language: Some(Language::Ru),
        russian_community: true,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::Toloka,
        key: "toloka",
        hosts: &["toloka.to"],
        aliases: &["toloka", "tolokato", "hurtom"],
        language: Some(Language::Uk),
        russian_community: false,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::TorrentGalaxy,
        key: "torrentgalaxy",
        hosts: &["torrentgalaxy.to", "tgx.rs", "torrentgalaxy.mx"],
        aliases: &["torrentgalaxy", "tgx"],
        language: None,
        russian_community: false,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::ThePirateBay,
        key: "thepiratebay",
        hosts: &["thepiratebay.org", "piratebay.org", "tpb.party"],
        aliases: &["thepiratebay", "tpb", "piratebay"],
        language: None,
        russian_community: false,
        unreliable_age: true,
    },
    TrackerInfo {
        tracker: Tracker::Yts,
        key: "yts",
        hosts: &["yts.mx", "yts.am", "yts.lt"],
        aliases: &["yts", "ytsmx", "yify"],
        language: None,
        russian_community: false,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::Eztv,
        key: "eztv",
        hosts: &["eztv.re", "eztv.io", "eztvx.to"],
        aliases: &["eztv"],
        language: None,
        russian_community: false,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::X1337,
        key: "1337x",
        hosts: &["1337x.to", "1337x.st", "x1337x.ws"],
        aliases: &["1337x", "x1337"],
        language: None,
        russian_community: false,
        unreliable_age: false,
    },
    TrackerInfo {
        tracker: Tracker::Nyaa,
        key: "nyaa",
        hosts: &["nyaa.si"],
        aliases: &["nyaa", "nyaasi"],
        language: None,
        russian_community: false,
        unreliable_age: false,
    },
];

static BY_ALIAS: Lazy<HashMap<&'static str, Tracker>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for info in &TRACKERS {
        map.insert(info.key, info.tracker);
        for alias in info.aliases {
            map.insert(*alias, info.tracker);
        }
    }
    map
});

impl Tracker {
    fn info(self) -> &'static TrackerInfo {
        &TRACKERS[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.info().key
    }

    /// Audience language for trackers that only carry one.
    pub fn language(self) -> Option<Language> {
        self.info().language
    }

    pub fn is_language_specific(self) -> bool {
        self.info().language.is_some()
    }

    pub fn is_russian_community(self) -> bool {
        self.info().russian_community
    }

    pub fn has_unreliable_age(self) -> bool {
        self.info().unreliable_age
    }

    /// Identify a tracker from a release's info URL, comment URL or the
    /// indexer's display name, in that order.
    pub fn resolve(
        info_url: Option<&str>,
        comment_url: Option<&str>,
        indexer_name: Option<&str>,
    ) -> Option<Self> {
        info_url
            .and_then(Self::from_url)
            .or_else(|| comment_url.and_then(Self::from_url))
            .or_else(|| indexer_name.and_then(Self::from_indexer_name))
    }

    /// Match a URL's host against known tracker domains.
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        TRACKERS
            .iter()
            .find(|info| {
                info.hosts
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{h}")))
            })
            .map(|info| info.tracker)
    }

    /// Match an indexer display name such as `RuTracker.org` or `1337x (API)`.
    pub fn from_indexer_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .split('(')
            .next()
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        BY_ALIAS.get(normalized.as_str()).copied()
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_declaration_order() {
        for (i, info) in TRACKERS.iter().enumerate() {
            assert_eq!(info.tracker as usize, i);
        }
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            Tracker::from_url("https://rutracker.org/forum/viewtopic.php?t=1"),
            Some(Tracker::Rutracker)
        );
        assert_eq!(
            Tracker::from_url("http://www.lostfilm.tv/series/x"),
            Some(Tracker::LostFilm)
        );
        assert_eq!(Tracker::from_url("https://example.com/t/1"), None);
        assert_eq!(Tracker::from_url("not a url"), None);
    }

    #[test]
    fn test_resolve_falls_back_to_indexer_name() {
        assert_eq!(
            Tracker::resolve(None, Some("https://example.com"), Some("1337x (API)")),
            Some(Tracker::X1337)
        );
        assert_eq!(
            Tracker::resolve(None, None, Some("RuTracker.org")),
            Some(Tracker::Rutracker)
        );
        assert_eq!(Tracker::resolve(None, None, Some("Mystery")), None);
    }

    #[test]
    fn test_info_url_wins_over_name() {
        assert_eq!(
            Tracker::resolve(Some("https://toloka.to/t1"), None, Some("kinozal")),
            Some(Tracker::Toloka)
        );
    }

    #[test]
    fn test_flags() {
        assert!(Tracker::LostFilm.is_language_specific());
        assert_eq!(Tracker::Toloka.language(), Some(Language::Uk));
        assert!(!Tracker::Rutracker.is_language_specific());
        assert!(Tracker::Kinozal.is_russian_community());
        assert!(!Tracker::Yts.is_russian_community());
        assert!(Tracker::Rutor.has_unreliable_age());
        assert!(!Tracker::Eztv.has_unreliable_age());
    }
}
