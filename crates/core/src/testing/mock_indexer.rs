//! Mock indexer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::indexer::{IndexerError, IndexerRelease, IndexerService};

/// Mock implementation of the IndexerService trait.
///
/// Returns the configured releases for every title and records the
/// `(title_indexer_id, season)` pairs it was asked for.
#[derive(Debug, Default)]
pub struct MockIndexer {
    releases: Arc<RwLock<Vec<IndexerRelease>>>,
    calls: Arc<RwLock<Vec<(i64, Option<u32>)>>>,
    next_error: Arc<RwLock<Option<IndexerError>>>,
}

impl MockIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_releases(&self, releases: Vec<IndexerRelease>) {
        *self.releases.write().await = releases;
    }

    /// Set an error to be returned on the next query.
    pub async fn set_next_error(&self, error: IndexerError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn calls(&self) -> Vec<(i64, Option<u32>)> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl IndexerService for MockIndexer {
    async fn get_releases(
        &self,
        title_indexer_id: i64,
        season: Option<u32>,
    ) -> Result<Vec<IndexerRelease>, IndexerError> {
        self.calls.write().await.push((title_indexer_id, season));
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        Ok(self.releases.read().await.clone())
    }
}
