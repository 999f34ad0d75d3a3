//! Discovery lifecycle integration tests.
//!
//! These tests run discovery jobs through the title store and chain them
//! into acquisition the way the supervisor does.

use std::sync::Arc;

use releasekeeper_core::{
    config::{AcquisitionConfig, DiscoveryConfig},
    discovery::ResolvedLocator,
    object_store::ObjectStore,
    release::{CandidateStatus, TorrentLocator},
    testing::{
        fixtures, MockIndexer, MockLocatorResolver, MockObjectStore, MockProber,
        MockTorrentClient,
    },
    title::TitleStore,
    torrent_client::{info_hash_from_bytes, AddTorrentRequest},
    AcquisitionJob, Deadline, DiscoveryJob, JobError, JobOutcome, JobRequest, SlotKey,
    SqliteTitleStore,
};

struct TestHarness {
    store: Arc<SqliteTitleStore>,
    indexer: Arc<MockIndexer>,
    locator: Arc<MockLocatorResolver>,
    objects: Arc<MockObjectStore>,
    torrents: Arc<MockTorrentClient>,
    prober: Arc<MockProber>,
    discovery: DiscoveryJob,
    acquisition: AcquisitionJob,
}

impl TestHarness {
    fn new() -> Self {
        let store = Arc::new(SqliteTitleStore::in_memory().expect("in-memory store"));
        let indexer = Arc::new(MockIndexer::new());
        let locator = Arc::new(MockLocatorResolver::new());
        let objects = Arc::new(MockObjectStore::new());
        let torrents = Arc::new(MockTorrentClient::new());
        let prober = Arc::new(MockProber::new());
        let discovery = DiscoveryJob::new(
            indexer.clone(),
            locator.clone(),
            objects.clone(),
            store.clone(),
            DiscoveryConfig::default(),
        );
        let acquisition = AcquisitionJob::new(
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
            indexer,
            locator,
            objects,
            torrents,
            prober,
            discovery,
            acquisition,
        }
    }

    fn budget() -> Deadline {
        Deadline::from_secs(60)
    }
}

#[tokio::test]
async fn test_unknown_title_and_slot() {
    let h = TestHarness::new();
    h.store.put(&fixtures::movie("m1")).unwrap();

    let missing = h
        .discovery
        .run(&JobRequest::title("nope"), &TestHarness::budget())
        .await;
    assert!(matches!(missing, Err(JobError::TitleNotFound(_))));

    let wrong_slot = h
        .discovery
        .run(&JobRequest::season("m1", 1), &TestHarness::budget())
        .await;
    assert!(wrong_slot.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_ready_slot_is_rearmed_by_rescan() {
    let h = TestHarness::new();
    h.store.put(&fixtures::movie("m1")).unwrap();
    h.indexer
        .set_releases(vec![fixtures::indexer_release("g1", &"a".repeat(40))])
        .await;
    let request = JobRequest::title("m1");

    let first = h.discovery.run(&request, &TestHarness::budget()).await.unwrap();
    assert_eq!(first.added, 1);
    let second = h.discovery.run(&request, &TestHarness::budget()).await.unwrap();
    assert!(second.ready);

    let key = SlotKey::movie("m1");
    assert!(h.store.get("m1").unwrap().unwrap().discovery(&key).unwrap().ready_to_process);

    h.discovery.request_rescan(&request).unwrap();
    let title = h.store.get("m1").unwrap().unwrap();
    assert!(!title.discovery(&key).unwrap().ready_to_process);

    h.discovery.run(&request, &TestHarness::budget()).await.unwrap();
    assert_eq!(h.indexer.call_count().await, 3);
}

#[tokio::test]
async fn test_stored_torrent_flows_into_paused_session() {
    let h = TestHarness::new();
    h.store.put(&fixtures::movie("m1")).unwrap();

    let body = fixtures::torrent_body("Movie.2020.1080p.mkv", 40_000);
    let hash = info_hash_from_bytes(&body).unwrap();
    let mut release = fixtures::indexer_release("g1", &"a".repeat(40));
    release.magnet_url = None;
    release.info_hash = None;
    release.download_url = Some("http://indexer/download/1".into());
    h.locator
        .set("http://indexer/download/1", ResolvedLocator::TorrentFile(body.clone()))
        .await;
    h.indexer.set_releases(vec![release]).await;

    let request = JobRequest::title("m1");
    let report = h.discovery.run(&request, &TestHarness::budget()).await.unwrap();
    assert_eq!(report.outcome, JobOutcome::Completed);
    assert_eq!(report.added, 1);

    let key = SlotKey::movie("m1");
    let title = h.store.get("m1").unwrap().unwrap();
    let candidate = title.slot(&key).unwrap().candidate(&hash).unwrap();
    assert_eq!(
        candidate.torrent().locator,
        TorrentLocator::StoredFile {
            key: key.torrent_key(&hash)
        }
    );

    h.torrents
        .register_torrent(
            &hash,
            vec![fixtures::torrent_file(0, "Movie.2020.1080p.mkv", 40_000)],
        )
        .await;
    let pass = h.acquisition.run(&request, &TestHarness::budget()).await.unwrap();
    assert_eq!(pass.pending, 1);

    let added = h.torrents.added_torrents().await;
    assert_eq!(added.len(), 1);
    match &added[0] {
        AddTorrentRequest::TorrentFile { data, paused, .. } => {
            assert_eq!(data, &body);
            assert!(*paused);
        }
        other => panic!("expected a torrent file, got {other:?}"),
    }

    // Finish the download; the settled slot drops its stored torrent body.
    h.torrents.set_file_progress(&hash, 0, 1.0).await;
    h.prober
        .set_result(
            format!("{}/Movie.2020.1080p.mkv", h.torrents.save_path()),
            fixtures::probe_result(None),
        )
        .await;
    let pass = h.acquisition.run(&request, &TestHarness::budget()).await.unwrap();
    assert_eq!(pass.promoted, 1);

    let title = h.store.get("m1").unwrap().unwrap();
    let slot = title.slot(&key).unwrap();
    assert!(slot.releases().contains_key(&hash));
    assert_eq!(slot.prior_decision(&hash), Some(CandidateStatus::Promoted));
    assert!(!h.objects.exists(&key.torrent_key(&hash)).await.unwrap());
    assert!(h.objects.exists(&key.media_key(&hash, "mkv")).await.unwrap());
}
