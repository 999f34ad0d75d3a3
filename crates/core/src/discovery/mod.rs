//! Candidate discovery.
//!
//! A discovery job queries the indexer for a movie or a season, screens each
//! descriptor it has not seen yet and stores the survivors as release
//! candidates keyed by info hash. A sweep that brings nothing new marks the
//! slot ready to be processed.

mod episodes;
mod filter;
mod locator;

pub use episodes::{
    episode_in_file_name, extract_episode_scope, matches_name_variant, normalize_title,
    EpisodeScope,
};
pub use filter::Rejection;
pub use locator::{HttpLocatorResolver, LocatorError, LocatorResolver, ResolvedLocator};

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::indexer::{IndexerError, IndexerRelease, IndexerService};
use crate::job::{Deadline, JobError, JobOutcome, JobRequest};
use crate::metrics;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::release::{
    Language, NewCandidate, ReleaseCandidate, TorrentLocator, TorrentSource,
};
use crate::title::{SlotKey, Title, TitleStore};
use crate::torrent_client::{hash_from_magnet, info_hash_from_bytes};

use filter::{screen, ScreenContext, Screened};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Indexer error: {0}")]
    Indexer(#[from] IndexerError),

    #[error("Slot not found: {0}")]
    SlotNotFound(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
}

/// Result of one discovery sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub outcome: JobOutcome,
    /// Candidates stored, counted once per target slot.
    pub added: usize,
    pub rejected: usize,
    /// Descriptors whose guid had not been seen before.
    pub new_guids: usize,
    /// Whether the slot is ready to be processed after this sweep.
    pub ready: bool,
}

impl DiscoveryReport {
    fn new() -> Self {
        Self {
            outcome: JobOutcome::Completed,
            added: 0,
            rejected: 0,
            new_guids: 0,
            ready: false,
        }
    }
}

/// How a torrent can be fetched once its hash is known.
enum Located {
    Magnet { uri: String, hash: String },
    TorrentFile { body: Vec<u8>, hash: String },
}

impl Located {
    fn hash(&self) -> &str {
        match self {
            Located::Magnet { hash, .. } | Located::TorrentFile { hash, .. } => hash,
        }
    }
}

enum Considered {
    Added(usize),
    Rejected(Rejection),
}

pub struct DiscoveryJob {
    indexer: Arc<dyn IndexerService>,
    locator: Arc<dyn LocatorResolver>,
    objects: Arc<dyn ObjectStore>,
    store: Arc<dyn TitleStore>,
    config: DiscoveryConfig,
}

impl DiscoveryJob {
    pub fn new(
        indexer: Arc<dyn IndexerService>,
        locator: Arc<dyn LocatorResolver>,
        objects: Arc<dyn ObjectStore>,
        store: Arc<dyn TitleStore>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            indexer,
            locator,
            objects,
            store,
            config,
        }
    }

    /// Load the title, sweep the requested slot and persist the result.
    ///
    /// Episode requests sweep the episode's season.
    pub async fn run(
        &self,
        request: &JobRequest,
        deadline: &Deadline,
    ) -> Result<DiscoveryReport, JobError> {
        let started = Instant::now();
        let mut title = self
            .store
            .get(&request.title_id)?
            .ok_or_else(|| JobError::TitleNotFound(request.title_id.clone()))?;
        let key = request.slot_key(&title)?;

        let result = self.discover(&mut title, &key, deadline).await;
        let outcome = match &result {
            Ok(report) => report.outcome.as_str(),
            Err(_) => "failed",
        };
        metrics::JOB_DURATION
            .with_label_values(&["discovery", outcome])
            .observe(started.elapsed().as_secs_f64());

        let report = result?;
        self.store.put(&title)?;
        Ok(report)
    }

    /// Re-arm discovery for a movie or season.
    pub fn request_rescan(&self, request: &JobRequest) -> Result<(), JobError> {
        let mut title = self
            .store
            .get(&request.title_id)?
            .ok_or_else(|| JobError::TitleNotFound(request.title_id.clone()))?;
        let key = request.slot_key(&title)?;
        let discovery = title
            .discovery_mut(&key)
            .ok_or_else(|| JobError::SlotNotFound(key.to_string()))?;
        discovery.request_rescan();
        info!(slot = %key, "Discovery re-armed");
        self.store.put(&title)?;
        Ok(())
    }

    /// Sweep one slot of an already loaded title. The caller persists it.
    pub async fn discover(
        &self,
        title: &mut Title,
        key: &SlotKey,
        deadline: &Deadline,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let key = match key {
            SlotKey::Episode {
                title_id, season, ..
            } => SlotKey::season(title_id.as_str(), *season),
            other => other.clone(),
        };
        let mut report = DiscoveryReport::new();

        let discovery = title
            .discovery(&key)
            .ok_or_else(|| DiscoveryError::SlotNotFound(key.to_string()))?;
        if discovery.ready_to_process {
            debug!(slot = %key, "Discovery disarmed, slot is ready");
            report.ready = true;
            return Ok(report);
        }

        let releases = self
            .indexer
            .get_releases(title.indexer_id, key.season_number())
            .await?;

        let now = Utc::now();
        let ctx = ScreenContext {
            min_seeders: self.config.min_seeders,
            staleness_window: chrono::Duration::days(i64::from(self.config.staleness_window_days)),
            now,
            last_release_time: title.last_release_time(&key),
            original_language: title.original_language,
        };

        for release in &releases {
            if deadline.is_expired() {
                info!(slot = %key, "Discovery budget exhausted, sweep left partial");
                report.outcome = JobOutcome::Partial;
                break;
            }
            if !self.mark_seen(title, &key, &release.guid) {
                continue;
            }
            report.new_guids += 1;

            match self.consider(title, &key, release, &ctx).await? {
                Considered::Added(count) => report.added += count,
                Considered::Rejected(rejection) => {
                    debug!(
                        slot = %key,
                        guid = %release.guid,
                        reason = rejection.as_str(),
                        "Descriptor rejected"
                    );
                    metrics::CANDIDATES_REJECTED
                        .with_label_values(&[rejection.as_str()])
                        .inc();
                    report.rejected += 1;
                }
            }
        }

        if let Some(discovery) = title.discovery_mut(&key) {
            discovery.last_sweep_at = Some(now);
            if report.outcome == JobOutcome::Completed && report.new_guids == 0 {
                discovery.mark_ready();
                report.ready = true;
            }
        }

        info!(
            slot = %key,
            descriptors = releases.len(),
            new = report.new_guids,
            added = report.added,
            rejected = report.rejected,
            ready = report.ready,
            "Discovery sweep finished"
        );
        Ok(report)
    }

    /// Record a guid as seen. Returns `false` if it already was.
    fn mark_seen(&self, title: &mut Title, key: &SlotKey, guid: &str) -> bool {
        match title.discovery_mut(key) {
            Some(discovery) => discovery.seen_guids.insert(guid.to_string()),
            None => false,
        }
    }

    async fn consider(
        &self,
        title: &mut Title,
        key: &SlotKey,
        release: &IndexerRelease,
        ctx: &ScreenContext,
    ) -> Result<Considered, DiscoveryError> {
        let screened = match screen(release, ctx) {
            Ok(screened) => screened,
            Err(rejection) => return Ok(Considered::Rejected(rejection)),
        };
        let targets = match target_slots(title, key, &release.title) {
            Ok(targets) => targets,
            Err(rejection) => return Ok(Considered::Rejected(rejection)),
        };
        let located = match self.locate(release).await {
            Ok(located) => located,
            Err(rejection) => return Ok(Considered::Rejected(rejection)),
        };

        let hash = located.hash().to_string();
        let mut added = 0;
        for target in targets {
            let Some(slot) = title.slot(&target) else {
                continue;
            };
            if slot.knows(&hash) {
                continue;
            }

            let locator = match &located {
                Located::Magnet { uri, .. } => TorrentLocator::Magnet { uri: uri.clone() },
                Located::TorrentFile { .. } => TorrentLocator::StoredFile {
                    key: target.torrent_key(&hash),
                },
            };
            let candidate = match ReleaseCandidate::new(new_candidate(release, &screened, &hash, locator)) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(slot = %target, guid = %release.guid, error = %e, "Invalid candidate");
                    return Ok(Considered::Rejected(Rejection::Invalid));
                }
            };

            if let Located::TorrentFile { body, .. } = &located {
                self.objects
                    .put(&target.torrent_key(&hash), body.clone())
                    .await?;
            }

            if let Some(slot) = title.slot_mut(&target) {
                if slot.add_candidate(candidate) {
                    debug!(slot = %target, hash = %hash, tracker = %screened.tracker, "Candidate stored");
                    metrics::CANDIDATES_DISCOVERED.inc();
                    added += 1;
                }
            }
        }

        if added == 0 {
            return Ok(Considered::Rejected(Rejection::Duplicate));
        }
        Ok(Considered::Added(added))
    }

    /// Work out the info hash, fetching the `.torrent` body if needed.
    async fn locate(&self, release: &IndexerRelease) -> Result<Located, Rejection> {
        let magnet = release
            .magnet_url
            .as_deref()
            .or(release.download_url.as_deref().filter(|u| u.starts_with("magnet:")));
        if let Some(uri) = magnet {
            return located_magnet(uri, release.info_hash.as_deref());
        }

        let url = release.download_url.as_deref().ok_or(Rejection::Locator)?;
        match self.locator.resolve(url).await {
            Ok(ResolvedLocator::Magnet(uri)) => located_magnet(&uri, release.info_hash.as_deref()),
            Ok(ResolvedLocator::TorrentFile(body)) => {
                let hash = info_hash_from_bytes(&body).map_err(|e| {
                    warn!(guid = %release.guid, error = %e, "Downloaded torrent is not valid");
                    Rejection::Invalid
                })?;
                Ok(Located::TorrentFile { body, hash })
            }
            Err(e) => {
                warn!(guid = %release.guid, url = %url, error = %e, "Failed to resolve download locator");
                Err(Rejection::Locator)
            }
        }
    }
}

fn located_magnet(uri: &str, declared_hash: Option<&str>) -> Result<Located, Rejection> {
    let hash = hash_from_magnet(uri)
        .or_else(|| declared_hash.map(|h| h.trim().to_lowercase()))
        .ok_or(Rejection::Invalid)?;
    Ok(Located::Magnet {
        uri: uri.to_string(),
        hash,
    })
}

/// Slots a descriptor is stored under: the movie, the whole season or the
/// existing episodes it covers.
fn target_slots(
    title: &Title,
    key: &SlotKey,
    release_title: &str,
) -> Result<Vec<SlotKey>, Rejection> {
    let SlotKey::Season { title_id, season } = key else {
        return Ok(vec![key.clone()]);
    };
    if !matches_name_variant(release_title, &title.names) {
        return Err(Rejection::NameMismatch);
    }
    match extract_episode_scope(release_title, *season) {
        None => Err(Rejection::OtherEpisodes),
        Some(EpisodeScope::WholeSeason) => Ok(vec![key.clone()]),
        Some(EpisodeScope::Episodes(numbers)) => {
            let targets: Vec<SlotKey> = numbers
                .into_iter()
                .map(|ep| SlotKey::episode(title_id.as_str(), *season, ep))
                .filter(|k| title.has_slot(k))
                .collect();
            if targets.is_empty() {
                Err(Rejection::OtherEpisodes)
            } else {
                Ok(targets)
            }
        }
    }
}

fn new_candidate(
    release: &IndexerRelease,
    screened: &Screened,
    hash: &str,
    locator: TorrentLocator,
) -> NewCandidate {
    let language_hints = release
        .languages
        .iter()
        .filter(|name| Language::from_name(name).is_none())
        .cloned()
        .collect();
    NewCandidate {
        guid: release.guid.clone(),
        title: release.title.clone(),
        rip_type: screened.rip_type,
        resolution: screened.resolution,
        size_bytes: release.size_bytes,
        release_time: screened.release_time,
        tracker: screened.tracker,
        languages: screened.languages.clone(),
        language_hints,
        unknown_title: release.unknown_title,
        source: TorrentSource {
            info_hash: hash.to_string(),
            locator,
            seeders: release.seeders.unwrap_or(0),
            info_url: release.info_url.clone().or_else(|| release.comment_url.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockIndexer, MockLocatorResolver, MockObjectStore};
    use crate::title::SqliteTitleStore;

    struct Harness {
        indexer: Arc<MockIndexer>,
        locator: Arc<MockLocatorResolver>,
        objects: Arc<MockObjectStore>,
        job: DiscoveryJob,
    }

    fn harness() -> Harness {
        let indexer = Arc::new(MockIndexer::new());
        let locator = Arc::new(MockLocatorResolver::new());
        let objects = Arc::new(MockObjectStore::new());
        let store = Arc::new(SqliteTitleStore::in_memory().unwrap());
        let job = DiscoveryJob::new(
            indexer.clone(),
            locator.clone(),
            objects.clone(),
            store,
            DiscoveryConfig::default(),
        );
        Harness {
            indexer,
            locator,
            objects,
            job,
        }
    }

    fn hash(c: char) -> String {
        c.to_string().repeat(40)
    }

    #[tokio::test]
    async fn test_movie_sweep_stores_and_dedups() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        let key = SlotKey::movie("m1");

        let mut upper = fixtures::indexer_release("g2", &hash('b'));
        upper.magnet_url = Some(format!("magnet:?xt=urn:btih:{}", "B".repeat(40)));
        h.indexer
            .set_releases(vec![
                fixtures::indexer_release("g1", &hash('a')),
                fixtures::indexer_release("g1-dup", &hash('a')),
                upper,
            ])
            .await;

        let report = h
            .job
            .discover(&mut title, &key, &Deadline::from_secs(60))
            .await
            .unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.new_guids, 3);
        assert!(!report.ready);

        let slot = title.slot(&key).unwrap();
        assert_eq!(slot.candidates().count(), 2);
        assert!(slot.contains_candidate(&"B".repeat(40)));
    }

    #[tokio::test]
    async fn test_repeated_sweep_marks_ready() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        let key = SlotKey::movie("m1");
        h.indexer
            .set_releases(vec![fixtures::indexer_release("g1", &hash('a'))])
            .await;

        let first = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(first.added, 1);
        assert!(!first.ready);

        let second = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.new_guids, 0);
        assert!(second.ready);
        let discovery = title.discovery(&key).unwrap();
        assert!(discovery.ready_to_process);
        assert!(discovery.seen_guids.is_empty());

        // Disarmed until a rescan is requested.
        let third = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert!(third.ready);
        assert_eq!(h.indexer.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_expired_deadline_is_partial() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        let key = SlotKey::movie("m1");
        h.indexer
            .set_releases(vec![fixtures::indexer_release("g1", &hash('a'))])
            .await;

        let report = h.job.discover(&mut title, &key, &Deadline::expired_now()).await.unwrap();
        assert_eq!(report.outcome, JobOutcome::Partial);
        assert_eq!(report.added, 0);
        assert!(!report.ready);
        assert!(!title.discovery(&key).unwrap().ready_to_process);
    }

    #[tokio::test]
    async fn test_repeated_season_sweep_marks_ready_without_duplicates() {
        let h = harness();
        let mut title = fixtures::show("s1", &[(1, 3)]);
        let key = SlotKey::season("s1", 1);
        let ep2 = SlotKey::episode("s1", 1, 2);
        let ep3 = SlotKey::episode("s1", 1, 3);

        let mut pack = fixtures::indexer_release("g1", &hash('a'));
        pack.title = "Show S01 1080p WEB-DL".into();
        let mut episodes = fixtures::indexer_release("g2", &hash('b'));
        episodes.title = "Show S01E02-E03 1080p WEB-DL".into();
        h.indexer.set_releases(vec![pack, episodes]).await;

        let first = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(first.new_guids, 2);
        assert!(!first.ready);
        assert!(!title.discovery(&key).unwrap().ready_to_process);
        let counts = |title: &Title| {
            [&key, &ep2, &ep3].map(|k| title.slot(k).unwrap().candidates().count())
        };
        let after_first = counts(&title);
        assert_eq!(after_first, [1, 1, 1]);

        let second = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(second.new_guids, 0);
        assert_eq!(second.added, 0);
        assert!(second.ready);
        assert!(title.discovery(&key).unwrap().ready_to_process);
        assert_eq!(counts(&title), after_first);
    }

    #[tokio::test]
    async fn test_season_sweep_targets_episodes() {
        let h = harness();
        let mut title = fixtures::show("s1", &[(1, 3)]);
        let key = SlotKey::season("s1", 1);

        let mut pack = fixtures::indexer_release("g1", &hash('a'));
        pack.title = "Show S01 1080p WEB-DL".into();
        let mut episodes = fixtures::indexer_release("g2", &hash('b'));
        episodes.title = "Show S01E02-E03 1080p WEB-DL".into();
        let mut other_season = fixtures::indexer_release("g3", &hash('c'));
        other_season.title = "Show S02E01 1080p".into();
        let mut other_show = fixtures::indexer_release("g4", &hash('d'));
        other_show.title = "Another Show S01E01 1080p".into();
        h.indexer
            .set_releases(vec![pack, episodes, other_season, other_show])
            .await;

        let report = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(report.added, 3);
        assert_eq!(report.rejected, 2);
        assert!(title.slot(&key).unwrap().contains_candidate(&hash('a')));
        assert!(!title
            .slot(&SlotKey::episode("s1", 1, 1))
            .unwrap()
            .has_candidates());
        for ep in [2, 3] {
            assert!(title
                .slot(&SlotKey::episode("s1", 1, ep))
                .unwrap()
                .contains_candidate(&hash('b')));
        }
        assert_eq!(h.indexer.calls().await, vec![(title.indexer_id, Some(1))]);
    }

    #[tokio::test]
    async fn test_http_locator_stores_torrent_body() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        let key = SlotKey::movie("m1");

        let body = fixtures::torrent_body("Movie.2020.1080p.mkv", 1024);
        let expected = info_hash_from_bytes(&body).unwrap();
        let mut release = fixtures::indexer_release("g1", &hash('a'));
        release.magnet_url = None;
        release.info_hash = None;
        release.download_url = Some("http://indexer/download/1".into());
        h.locator
            .set("http://indexer/download/1", ResolvedLocator::TorrentFile(body.clone()))
            .await;
        h.indexer.set_releases(vec![release]).await;

        let report = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(report.added, 1);
        let candidate = title.slot(&key).unwrap().candidate(&expected).unwrap();
        assert_eq!(
            candidate.torrent().locator,
            TorrentLocator::StoredFile {
                key: key.torrent_key(&expected)
            }
        );
        assert_eq!(h.objects.get(&key.torrent_key(&expected)).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_unresolvable_locator_rejected() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        let key = SlotKey::movie("m1");
        let mut release = fixtures::indexer_release("g1", &hash('a'));
        release.magnet_url = None;
        release.download_url = Some("http://indexer/download/missing".into());
        h.indexer.set_releases(vec![release]).await;

        let report = h.job.discover(&mut title, &key, &Deadline::from_secs(60)).await.unwrap();
        assert_eq!(report.added, 0);
        assert_eq!(report.rejected, 1);
    }

    #[tokio::test]
    async fn test_indexer_failure_is_an_error() {
        let h = harness();
        let mut title = fixtures::movie("m1");
        h.indexer.set_next_error(IndexerError::Timeout).await;
        let result = h
            .job
            .discover(&mut title, &SlotKey::movie("m1"), &Deadline::from_secs(60))
            .await;
        assert!(matches!(result, Err(DiscoveryError::Indexer(IndexerError::Timeout))));
    }
}
