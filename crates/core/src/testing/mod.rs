//! Testing utilities and mock implementations.
//!
//! Every external collaborator of the discovery and acquisition jobs has an
//! in-memory mock here, so whole passes can run without an indexer, a
//! torrent daemon or ffprobe.
//!
//! # Example
//!
//! ```rust,ignore
//! use releasekeeper_core::testing::{fixtures, MockIndexer, MockTorrentClient};
//!
//! let indexer = MockIndexer::new();
//! indexer.set_releases(vec![fixtures::indexer_release("g1", &hash)]).await;
//!
//! let torrents = MockTorrentClient::new();
//! torrents.register_torrent(&hash, vec![fixtures::torrent_file(0, "Movie.mkv", 1000)]).await;
//! ```

mod mock_indexer;
mod mock_locator;
mod mock_object_store;
mod mock_prober;
mod mock_torrent_client;

pub use mock_indexer::MockIndexer;
pub use mock_locator::MockLocatorResolver;
pub use mock_object_store::MockObjectStore;
pub use mock_prober::MockProber;
pub use mock_torrent_client::MockTorrentClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::indexer::{IndexerRelease, Protocol};
    use crate::prober::{ProbeResult, ProbeStream, StreamDisposition, StreamKind};
    use crate::release::{
        AudioTrack, CandidateKind, Language, NewCandidate, NewRelease, Release,
        ReleaseCandidate, Resolution, RipType, TorrentLocator, TorrentSource, Tracker, VoiceType,
    };
    use crate::title::{Episode, Movie, Season, Title, TitleKind, TvShow};
    use crate::torrent_client::{FilePriority, TorrentFile};

    /// Indexer id shared by every fixture title.
    pub const INDEXER_ID: i64 = 42;

    /// A movie named "Movie" with no runtime or release date.
    pub fn movie(id: &str) -> Title {
        Title {
            id: id.to_string(),
            names: vec!["Movie".to_string()],
            original_language: Some(Language::En),
            indexer_id: INDEXER_ID,
            kind: TitleKind::Movie(Movie::default()),
        }
    }

    /// A show named "Show" with `(season, episode_count)` seasons; episodes
    /// are numbered from 1.
    pub fn show(id: &str, seasons: &[(u32, u32)]) -> Title {
        let seasons = seasons
            .iter()
            .map(|&(number, episodes)| {
                let mut season = Season::new(number);
                season.episodes = (1..=episodes).map(|ep| (ep, Episode::new(ep))).collect();
                (number, season)
            })
            .collect::<BTreeMap<_, _>>();
        Title {
            id: id.to_string(),
            names: vec!["Show".to_string()],
            original_language: Some(Language::En),
            indexer_id: INDEXER_ID,
            kind: TitleKind::TvShow(TvShow { seasons }),
        }
    }

    pub fn magnet(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{hash}")
    }

    /// A 1080p WEB-DL release from YTS, offered as a magnet, one day old.
    pub fn indexer_release(guid: &str, hash: &str) -> IndexerRelease {
        IndexerRelease {
            guid: guid.to_string(),
            title: "Movie 2020 1080p WEB-DL".to_string(),
            protocol: Protocol::Torrent,
            quality_name: "WEBDL-1080p".to_string(),
            resolution_hint: Some(1080),
            age_seconds: Some(86_400),
            size_bytes: Some(2 * 1024 * 1024 * 1024),
            seeders: Some(50),
            custom_format_score: 0,
            languages: Vec::new(),
            download_url: None,
            magnet_url: Some(magnet(hash)),
            info_hash: Some(hash.to_string()),
            indexer_name: Some("YTS".to_string()),
            info_url: Some("https://yts.mx/movies/x".to_string()),
            comment_url: None,
            unknown_title: false,
        }
    }

    /// A WEB 1080p magnet candidate from YTS with 50 seeders.
    pub fn candidate(hash: &str) -> ReleaseCandidate {
        ReleaseCandidate::new(NewCandidate {
            guid: format!("guid-{hash}"),
            title: "Movie 2020 1080p WEB-DL".to_string(),
            rip_type: RipType::Web,
            resolution: Resolution::Fhd,
            size_bytes: Some(2 * 1024 * 1024 * 1024),
            release_time: None,
            tracker: Tracker::Yts,
            languages: Vec::new(),
            language_hints: Vec::new(),
            unknown_title: false,
            source: TorrentSource {
                info_hash: hash.to_lowercase(),
                locator: TorrentLocator::Magnet { uri: magnet(hash) },
                seeders: 50,
                info_url: None,
            },
        })
        .expect("valid fixture candidate")
    }

    /// Same as [`candidate`] with a different tracker and seeder count.
    pub fn candidate_from(hash: &str, tracker: Tracker, seeders: u32) -> ReleaseCandidate {
        let mut candidate = candidate(hash);
        candidate.tracker = tracker;
        let CandidateKind::Torrent(source) = &mut candidate.kind;
        source.seeders = seeders;
        candidate
    }

    pub fn english_track(index: u32) -> AudioTrack {
        AudioTrack {
            index,
            language: Language::En,
            voice_type: Some(VoiceType::Original),
            author: None,
            channels: Some(6),
            bitrate: None,
        }
    }

    /// A WEB 1080p release with one original English track.
    pub fn release(hash: &str) -> Release {
        Release::new(NewRelease {
            id: hash.to_string(),
            rip_type: RipType::Web,
            resolution: Resolution::Fhd,
            size_bytes: 2 * 1024 * 1024 * 1024,
            media_key: format!("m1/{}.mkv", hash.to_lowercase()),
            tracker: Some(Tracker::Yts),
            audio: vec![english_track(1)],
            subtitles: Vec::new(),
        })
        .expect("valid fixture release")
    }

    pub fn torrent_file(index: u32, name: &str, size_bytes: u64) -> TorrentFile {
        TorrentFile {
            index,
            name: name.to_string(),
            size_bytes,
            progress: 0.0,
            priority: FilePriority::Normal,
        }
    }

    /// Probe result of a file with a leading video stream followed by one
    /// English audio stream.
    pub fn probe_result(duration_secs: Option<f64>) -> ProbeResult {
        let stream = |index: u32, kind: StreamKind, language: Option<&str>| ProbeStream {
            index,
            kind,
            codec_name: None,
            channels: (kind == StreamKind::Audio).then_some(6),
            bitrate: None,
            language: language.map(str::to_string),
            title: None,
            disposition: StreamDisposition::default(),
        };
        ProbeResult {
            duration_secs,
            size_bytes: None,
            streams: vec![
                stream(0, StreamKind::Video, None),
                stream(1, StreamKind::Audio, Some("eng")),
            ],
        }
    }

    /// A minimal single-file bencoded `.torrent` body.
    pub fn torrent_body(name: &str, length: u64) -> Vec<u8> {
        const PIECE_LENGTH: u64 = 16 * 1024;
        let pieces = length.div_ceil(PIECE_LENGTH).max(1) as usize;

        let mut body = Vec::new();
        body.extend_from_slice(b"d4:infod");
        body.extend_from_slice(format!("6:lengthi{length}e").as_bytes());
        body.extend_from_slice(format!("4:name{}:{name}", name.len()).as_bytes());
        body.extend_from_slice(format!("12:piece lengthi{PIECE_LENGTH}e").as_bytes());
        body.extend_from_slice(format!("6:pieces{}:", pieces * 20).as_bytes());
        body.extend(std::iter::repeat_n(0u8, pieces * 20));
        body.extend_from_slice(b"ee");
        body
    }
}
