//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the real router over an in-memory title store and the
//! core mocks, so whole jobs can be driven through HTTP without an indexer,
//! a torrent daemon or ffprobe.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use releasekeeper_core::{
    load_config_from_str,
    testing::{
        MockIndexer, MockLocatorResolver, MockObjectStore, MockProber, MockTorrentClient,
    },
    AcquisitionJob, Config, DiscoveryJob, SqliteTitleStore, Supervisor,
};
use releasekeeper_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use releasekeeper_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_discover() {
///     let fixture = TestFixture::new();
///     fixture.store.put(&fixtures::movie("m1")).unwrap();
///
///     let response = fixture.post("/api/v1/jobs/discover", json!({"titleId": "m1"})).await;
///     assert_eq!(response.status, StatusCode::OK);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteTitleStore>,
    pub indexer: Arc<MockIndexer>,
    pub torrents: Arc<MockTorrentClient>,
    pub prober: Arc<MockProber>,
    pub objects: Arc<MockObjectStore>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

fn test_config() -> Config {
    load_config_from_str(
        r#"
[indexer.radarr]
url = "http://localhost:7878"
api_key = "radarr-key"

[torrent_client.qbittorrent]
url = "http://localhost:8081"
username = "admin"
password = "hunter2"

[object_store]
root = "/unused"

[acquisition]
metadata_poll_interval_ms = 10
metadata_timeout_secs = 1

[job]
budget_secs = 60
"#,
    )
    .expect("valid test config")
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(SqliteTitleStore::in_memory().expect("in-memory store"));
        let indexer = Arc::new(MockIndexer::new());
        let locator = Arc::new(MockLocatorResolver::new());
        let objects = Arc::new(MockObjectStore::new());
        let torrents = Arc::new(MockTorrentClient::new());
        let prober = Arc::new(MockProber::new());

        let discovery = Arc::new(DiscoveryJob::new(
            indexer.clone(),
            locator,
            objects.clone(),
            store.clone(),
            config.discovery.clone(),
        ));
        let acquisition = Arc::new(AcquisitionJob::new(
            torrents.clone(),
            prober.clone(),
            objects.clone(),
            store.clone(),
            config.acquisition.clone(),
        ));
        let supervisor = Supervisor::new(
            store.clone(),
            Arc::clone(&discovery),
            Arc::clone(&acquisition),
            config.job.clone(),
        );

        let state = Arc::new(AppState::new(config, discovery, acquisition, supervisor));
        Self {
            router: create_router(state),
            store,
            indexer,
            torrents,
            prober,
            objects,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a GET request and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.post_raw(path, &body.to_string()).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}
