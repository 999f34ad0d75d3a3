//! Acquisition lifecycle integration tests.
//!
//! These tests drive whole acquisition passes against the mock torrent
//! client, prober and object store:
//! candidate -> paused session -> disk gate -> download -> inspect -> publish

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tempfile::TempDir;

use releasekeeper_core::{
    config::AcquisitionConfig,
    release::{CandidateStatus, Tracker},
    testing::{fixtures, MockObjectStore, MockProber, MockTorrentClient},
    title::{TitleKind, TitleStore},
    torrent_client::{AddTorrentRequest, FilePriority, TorrentClientError, TorrentState},
    AcquisitionError, AcquisitionJob, Deadline, JobError, JobOutcome, JobRequest, SlotKey,
    SqliteTitleStore, Title,
};

const GIB: u64 = 1024 * 1024 * 1024;

struct TestHarness {
    store: Arc<SqliteTitleStore>,
    torrents: Arc<MockTorrentClient>,
    prober: Arc<MockProber>,
    objects: Arc<MockObjectStore>,
    job: AcquisitionJob,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteTitleStore::new(&temp_dir.path().join("titles.db"))
                .expect("Failed to create title store"),
        );
        let torrents = Arc::new(MockTorrentClient::new());
        let prober = Arc::new(MockProber::new());
        let objects = Arc::new(MockObjectStore::new());
        let job = AcquisitionJob::new(
            torrents.clone(),
            prober.clone(),
            objects.clone(),
            store.clone(),
            AcquisitionConfig {
                metadata_poll_interval_ms: 10,
                metadata_timeout_secs: 1,
                ..Default::default()
            },
        );
        Self {
            store,
            torrents,
            prober,
            objects,
            job,
            _temp_dir: temp_dir,
        }
    }

    fn load(&self, id: &str) -> Title {
        self.store.get(id).unwrap().expect("title stored")
    }

    async fn run(&self, request: JobRequest) -> Result<releasekeeper_core::AcquisitionReport, JobError> {
        self.job.run(&request, &Deadline::from_secs(60)).await
    }

    fn download_path(&self, name: &str) -> String {
        format!("{}/{}", self.torrents.save_path(), name)
    }
}

fn hash(c: char) -> String {
    c.to_string().repeat(40)
}

fn movie_with(candidates: Vec<releasekeeper_core::release::ReleaseCandidate>) -> Title {
    let mut title = fixtures::movie("m1");
    let slot = title.slot_mut(&SlotKey::movie("m1")).unwrap();
    for candidate in candidates {
        slot.add_candidate(candidate);
    }
    title
}

#[tokio::test]
async fn test_movie_download_is_published() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .register_torrent(
            &a,
            vec![
                fixtures::torrent_file(0, "Movie.2020.1080p.mkv", 1_000),
                fixtures::torrent_file(1, "Movie.2020.1080p.nfo", 10),
            ],
        )
        .await;

    // First pass adds the session and enables the selected file only.
    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.outcome, JobOutcome::Completed);
    assert_eq!(report.pending, 1);
    assert_eq!(report.promoted, 0);
    assert_eq!(
        h.torrents.file_priorities(&a).await,
        vec![FilePriority::Normal, FilePriority::Skip]
    );
    let added = h.torrents.added_torrents().await;
    assert_eq!(added.len(), 1);
    assert!(matches!(added[0], AddTorrentRequest::Magnet { .. }));
    assert_eq!(
        added[0].tags(),
        &["releasekeeper".to_string(), "releasekeeper:m1".to_string()]
    );

    // Download finishes; second pass inspects and publishes.
    h.torrents.set_file_progress(&a, 0, 1.0).await;
    let path = h.download_path("Movie.2020.1080p.mkv");
    h.prober
        .set_result(path.clone(), fixtures::probe_result(Some(6000.0)))
        .await;

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.promoted, 1);
    assert_eq!(report.published, 1);
    assert_eq!(h.torrents.removed().await, vec![a.clone()]);

    let title = h.load("m1");
    let slot = title.slot(&SlotKey::movie("m1")).unwrap();
    let entry = slot.releases().get(&a).expect("release published");
    assert_eq!(entry.release.media_key, format!("m1/{a}.mkv"));
    assert_eq!(entry.release.audio.len(), 1);
    assert!(!slot.has_candidates(), "settled movie slot is reset");
    assert_eq!(slot.prior_decision(&a), Some(CandidateStatus::Promoted));
    assert_eq!(
        h.objects.source_of(&format!("m1/{a}.mkv")).await,
        Some(path.into())
    );
}

#[tokio::test]
async fn test_disk_gate_defers_download() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .register_torrent(&a, vec![fixtures::torrent_file(0, "Movie.mkv", 5 * GIB)])
        .await;
    h.torrents.set_free_space(24 * GIB).await;

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(h.torrents.file_priorities(&a).await, vec![FilePriority::Skip]);

    h.torrents.set_free_space(100 * GIB).await;
    h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(h.torrents.file_priorities(&a).await, vec![FilePriority::Normal]);
}

#[tokio::test]
async fn test_disk_gate_requires_free_space_strictly_above_margin() {
    let h = TestHarness::new();
    let a = hash('a');
    let margin = AcquisitionConfig::default().disk_safety_margin_bytes;
    let size = 5 * GIB;
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .register_torrent(
            &a,
            vec![
                fixtures::torrent_file(0, "Movie.mkv", size),
                fixtures::torrent_file(1, "Movie.nfo", 10),
            ],
        )
        .await;

    // Exactly the margin left after the download: stays deferred.
    h.torrents.set_free_space(margin + size).await;
    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(
        h.torrents.file_priorities(&a).await,
        vec![FilePriority::Skip, FilePriority::Skip]
    );

    // One byte more enables the selected file only.
    h.torrents.set_free_space(margin + size + 1).await;
    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(
        h.torrents.file_priorities(&a).await,
        vec![FilePriority::Normal, FilePriority::Skip]
    );
}

#[tokio::test]
async fn test_lower_ranked_candidate_waits() {
    let h = TestHarness::new();
    let (a, b) = (hash('a'), hash('b'));
    h.store
        .put(&movie_with(vec![
            fixtures::candidate(&a),
            fixtures::candidate_from(&b, Tracker::Yts, 5),
        ]))
        .unwrap();
    for hash in [&a, &b] {
        h.torrents
            .register_torrent(hash, vec![fixtures::torrent_file(0, "Movie.mkv", 1_000)])
            .await;
    }

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.pending, 1);

    // The runner-up gets a prepared session but stays fully disabled.
    assert!(h.torrents.has_torrent(&b).await);
    assert_eq!(h.torrents.file_priorities(&a).await, vec![FilePriority::Normal]);
    assert_eq!(h.torrents.file_priorities(&b).await, vec![FilePriority::Skip]);
}

#[tokio::test]
async fn test_stalled_download_is_dropped() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .register_torrent(&a, vec![fixtures::torrent_file(0, "Movie.mkv", 1_000)])
        .await;
    h.run(JobRequest::title("m1")).await.unwrap();

    h.torrents.set_state(&a, TorrentState::Stalled).await;
    h.torrents
        .set_added_at(&a, Utc::now() - ChronoDuration::hours(7))
        .await;

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert!(!h.torrents.has_torrent(&a).await);
    let title = h.load("m1");
    assert_eq!(
        title.slot(&SlotKey::movie("m1")).unwrap().prior_decision(&a),
        Some(CandidateStatus::Ignored)
    );
}

#[tokio::test]
async fn test_young_slow_download_keeps_going() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .register_torrent(&a, vec![fixtures::torrent_file(0, "Movie.mkv", 1_000)])
        .await;
    h.run(JobRequest::title("m1")).await.unwrap();

    h.torrents.set_eta(&a, Some(3 * 86_400)).await;
    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.pending, 1);
    assert!(h.torrents.has_torrent(&a).await);
}

#[tokio::test]
async fn test_runtime_mismatch_ignores_candidate() {
    let h = TestHarness::new();
    let a = hash('a');
    let mut title = movie_with(vec![fixtures::candidate(&a)]);
    if let TitleKind::Movie(movie) = &mut title.kind {
        movie.runtime_minutes = Some(100);
    }
    h.store.put(&title).unwrap();
    h.torrents
        .register_torrent(&a, vec![fixtures::torrent_file(0, "Movie.mkv", 1_000)])
        .await;
    h.run(JobRequest::title("m1")).await.unwrap();

    h.torrents.set_file_progress(&a, 0, 1.0).await;
    h.prober
        .set_result(h.download_path("Movie.mkv"), fixtures::probe_result(Some(3000.0)))
        .await;

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert_eq!(report.published, 0);
    assert!(h.objects.keys().await.is_empty());
    assert!(h
        .load("m1")
        .slot(&SlotKey::movie("m1"))
        .unwrap()
        .releases()
        .is_empty());
}

#[tokio::test]
async fn test_missing_metadata_ignores_candidate() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert_eq!(h.torrents.removed().await, vec![a]);
}

#[tokio::test]
async fn test_prior_decision_skips_session() {
    let h = TestHarness::new();
    let a = hash('a');
    let mut title = movie_with(vec![fixtures::candidate(&a)]);
    title
        .slot_mut(&SlotKey::movie("m1"))
        .unwrap()
        .record_decision(&a, CandidateStatus::Ignored);
    h.store.put(&title).unwrap();

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert!(h.torrents.added_torrents().await.is_empty());
}

#[tokio::test]
async fn test_same_tracker_loser_short_circuits() {
    let h = TestHarness::new();
    let (a, b) = (hash('a'), hash('b'));
    let mut title = movie_with(vec![
        fixtures::candidate_from(&a, Tracker::LostFilm, 50),
        fixtures::candidate_from(&b, Tracker::LostFilm, 5),
    ]);
    title
        .slot_mut(&SlotKey::movie("m1"))
        .unwrap()
        .resolve_candidate(&a, CandidateStatus::Promoted);
    h.store.put(&title).unwrap();

    let report = h.run(JobRequest::title("m1")).await.unwrap();
    assert_eq!(report.ignored, 1);
    assert!(h.torrents.added_torrents().await.is_empty());
}

#[tokio::test]
async fn test_daemon_outage_stops_pass() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();
    h.torrents
        .set_next_error(TorrentClientError::ConnectionFailed("refused".into()))
        .await;

    let result = h.run(JobRequest::title("m1")).await;
    assert!(matches!(
        result,
        Err(JobError::Acquisition(AcquisitionError::TorrentClient(
            TorrentClientError::ConnectionFailed(_)
        )))
    ));
    let title = h.load("m1");
    let slot = title.slot(&SlotKey::movie("m1")).unwrap();
    assert!(!slot.candidate(&a).unwrap().is_resolved());
}

#[tokio::test]
async fn test_expired_budget_is_partial() {
    let h = TestHarness::new();
    let a = hash('a');
    h.store.put(&movie_with(vec![fixtures::candidate(&a)])).unwrap();

    let report = h
        .job
        .run(&JobRequest::title("m1"), &Deadline::expired_now())
        .await
        .unwrap();
    assert_eq!(report.outcome, JobOutcome::Partial);
    assert!(h.torrents.added_torrents().await.is_empty());
}

#[tokio::test]
async fn test_season_pack_publishes_each_episode() {
    let h = TestHarness::new();
    let a = hash('a');
    let mut title = fixtures::show("s1", &[(1, 2)]);
    let season = SlotKey::season("s1", 1);
    title
        .slot_mut(&season)
        .unwrap()
        .add_candidate(fixtures::candidate(&a));
    h.store.put(&title).unwrap();
    h.torrents
        .register_torrent(
            &a,
            vec![
                fixtures::torrent_file(0, "Show.S01/Show.S01E01.1080p.mkv", 1_000),
                fixtures::torrent_file(1, "Show.S01/Show.S01E02.1080p.mkv", 1_000),
                fixtures::torrent_file(2, "Show.S01/Show.S01.Sample.mkv", 10),
            ],
        )
        .await;

    let report = h.run(JobRequest::season("s1", 1)).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(
        h.torrents.file_priorities(&a).await,
        vec![FilePriority::Normal, FilePriority::Normal, FilePriority::Skip]
    );

    for (index, name) in [(0, "Show.S01E01.1080p.mkv"), (1, "Show.S01E02.1080p.mkv")] {
        h.torrents.set_file_progress(&a, index, 1.0).await;
        h.prober
            .set_result(
                h.download_path(&format!("Show.S01/{name}")),
                fixtures::probe_result(Some(2700.0)),
            )
            .await;
    }

    let report = h.run(JobRequest::season("s1", 1)).await.unwrap();
    assert_eq!(report.promoted, 1);
    assert_eq!(report.published, 2);

    let title = h.load("s1");
    for ep in [1, 2] {
        let key = SlotKey::episode("s1", 1, ep);
        let entry = title.slot(&key).unwrap().releases().get(&a).unwrap();
        assert_eq!(entry.release.media_key, format!("s1/1/{ep}/{a}.mkv"));
    }
    // The season is not ready yet, so its candidate map is kept.
    assert!(title.slot(&season).unwrap().has_candidates());
}

#[tokio::test]
async fn test_shared_session_tags_follow_slots() {
    let h = TestHarness::new();
    let a = hash('a');
    let mut title = fixtures::show("s1", &[(1, 2)]);
    let season = SlotKey::season("s1", 1);
    let first = SlotKey::episode("s1", 1, 1);
    for key in [&season, &first] {
        title
            .slot_mut(key)
            .unwrap()
            .add_candidate(fixtures::candidate(&a));
    }
    h.store.put(&title).unwrap();
    h.torrents
        .register_torrent(
            &a,
            vec![
                fixtures::torrent_file(0, "Show.S01/Show.S01E01.1080p.mkv", 1_000),
                fixtures::torrent_file(1, "Show.S01/Show.S01E02.1080p.mkv", 1_000),
            ],
        )
        .await;

    let report = h.run(JobRequest::season("s1", 1)).await.unwrap();
    assert_eq!(report.pending, 2);
    assert_eq!(h.torrents.added_torrents().await.len(), 1);
    assert_eq!(
        h.torrents.tags_added().await,
        vec![(a.clone(), vec!["releasekeeper:s1/1/1".to_string()])]
    );
    assert_eq!(
        h.torrents.session_tags(&a).await,
        vec!["releasekeeper", "releasekeeper:s1/1", "releasekeeper:s1/1/1"]
    );

    // A second pass over an already tagged session adds nothing.
    h.run(JobRequest::season("s1", 1)).await.unwrap();
    assert_eq!(h.torrents.tags_added().await.len(), 1);

    h.torrents.set_state(&a, TorrentState::Stalled).await;
    h.torrents
        .set_added_at(&a, Utc::now() - ChronoDuration::hours(7))
        .await;

    let report = h.run(JobRequest::season("s1", 1)).await.unwrap();
    assert_eq!(report.ignored, 2);
    // The season slot lets go first while the episode slot still holds the session.
    assert_eq!(
        h.torrents.tags_removed().await,
        vec![(a.clone(), vec!["releasekeeper:s1/1".to_string()])]
    );
    assert_eq!(h.torrents.removed().await, vec![a.clone()]);
    assert!(!h.torrents.has_torrent(&a).await);
}
