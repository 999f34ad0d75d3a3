//! Fan-out over every stored title.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{Deadline, JobError, JobOutcome, JobRequest};
use crate::acquisition::AcquisitionJob;
use crate::config::JobConfig;
use crate::discovery::DiscoveryJob;
use crate::title::{Title, TitleKind, TitleStore};

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub titles: usize,
    /// Slot jobs that ran to completion.
    pub completed: usize,
    /// Slot jobs cut short by their budget.
    pub partial: usize,
    pub failed: usize,
}

enum SlotResult {
    Completed,
    Partial,
    Failed,
}

/// Runs discovery then acquisition for every slot of every title.
///
/// Slots of one title run one after another so a title aggregate is never
/// written by two jobs at once; up to `max_concurrent_titles` titles are in
/// flight.
pub struct Supervisor {
    store: Arc<dyn TitleStore>,
    discovery: Arc<DiscoveryJob>,
    acquisition: Arc<AcquisitionJob>,
    config: JobConfig,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn TitleStore>,
        discovery: Arc<DiscoveryJob>,
        acquisition: Arc<AcquisitionJob>,
        config: JobConfig,
    ) -> Self {
        Self {
            store,
            discovery,
            acquisition,
            config,
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, JobError> {
        let ids = self.store.list_ids()?;
        info!(titles = ids.len(), "Starting sweep");

        let results: Vec<Vec<SlotResult>> = stream::iter(ids.iter().cloned())
            .map(|id| async move { self.sweep_title(&id).await })
            .buffer_unordered(self.config.max_concurrent_titles.max(1))
            .collect()
            .await;

        let mut report = SweepReport {
            titles: ids.len(),
            ..Default::default()
        };
        for result in results.iter().flatten() {
            match result {
                SlotResult::Completed => report.completed += 1,
                SlotResult::Partial => report.partial += 1,
                SlotResult::Failed => report.failed += 1,
            }
        }
        info!(
            titles = report.titles,
            completed = report.completed,
            partial = report.partial,
            failed = report.failed,
            "Sweep finished"
        );
        Ok(report)
    }

    async fn sweep_title(&self, id: &str) -> Vec<SlotResult> {
        let title = match self.store.get(id) {
            Ok(Some(title)) => title,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(title = %id, error = %e, "Failed to load title");
                return vec![SlotResult::Failed];
            }
        };

        let mut results = Vec::new();
        for request in requests_for(&title) {
            results.push(self.run_slot(&request).await);
        }
        results
    }

    async fn run_slot(&self, request: &JobRequest) -> SlotResult {
        let deadline = Deadline::from_secs(self.config.budget_secs);

        let discovered = match self.discovery.run(request, &deadline).await {
            Ok(report) => report,
            Err(e) => {
                warn!(title = %request.title_id, season = ?request.season_number, error = %e, "Discovery job failed");
                return SlotResult::Failed;
            }
        };
        if discovered.outcome == JobOutcome::Partial {
            return SlotResult::Partial;
        }

        match self.acquisition.run(request, &deadline).await {
            Ok(report) if report.outcome == JobOutcome::Partial => SlotResult::Partial,
            Ok(_) => SlotResult::Completed,
            Err(e) => {
                warn!(title = %request.title_id, season = ?request.season_number, error = %e, "Acquisition job failed");
                SlotResult::Failed
            }
        }
    }
}

/// One request per movie, or per season of a show.
fn requests_for(title: &Title) -> Vec<JobRequest> {
    match &title.kind {
        TitleKind::Movie(_) => vec![JobRequest::title(&title.id)],
        TitleKind::TvShow(show) => show
            .seasons
            .keys()
            .map(|season| JobRequest::season(&title.id, *season))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcquisitionConfig, DiscoveryConfig};
    use crate::release::CandidateStatus;
    use crate::testing::{
        fixtures, MockIndexer, MockLocatorResolver, MockObjectStore, MockProber,
        MockTorrentClient,
    };
    use crate::title::{SlotKey, SqliteTitleStore};

    #[test]
    fn test_requests_per_slot() {
        assert_eq!(
            requests_for(&fixtures::movie("m1")),
            vec![JobRequest::title("m1")]
        );
        assert_eq!(
            requests_for(&fixtures::show("s1", &[(1, 2), (2, 1)])),
            vec![JobRequest::season("s1", 1), JobRequest::season("s1", 2)]
        );
    }

    #[tokio::test]
    async fn test_sweep_discovers_every_slot() {
        let store = Arc::new(SqliteTitleStore::in_memory().unwrap());
        store.put(&fixtures::movie("m1")).unwrap();
        store.put(&fixtures::show("s1", &[(1, 2), (2, 1)])).unwrap();

        let indexer = Arc::new(MockIndexer::new());
        indexer
            .set_releases(vec![fixtures::indexer_release("g1", &"a".repeat(40))])
            .await;
        let objects = Arc::new(MockObjectStore::new());
        let discovery = Arc::new(DiscoveryJob::new(
            indexer.clone(),
            Arc::new(MockLocatorResolver::new()),
            objects.clone(),
            store.clone(),
            DiscoveryConfig::default(),
        ));
        let acquisition = Arc::new(AcquisitionJob::new(
            Arc::new(MockTorrentClient::new()),
            Arc::new(MockProber::new()),
            objects,
            store.clone(),
            AcquisitionConfig {
                metadata_timeout_secs: 0,
                ..Default::default()
            },
        ));

        let supervisor = Supervisor::new(store.clone(), discovery, acquisition, JobConfig::default());
        let report = supervisor.sweep().await.unwrap();

        assert_eq!(report.titles, 2);
        assert_eq!(report.completed + report.partial + report.failed, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(indexer.call_count().await, 3);

        // The magnet never yields metadata, so the candidate is ignored and
        // the settled movie slot is reset.
        let movie = store.get("m1").unwrap().unwrap();
        let slot = movie.slot(&SlotKey::movie("m1")).unwrap();
        assert!(!slot.has_candidates());
        assert_eq!(
            slot.prior_decision(&"a".repeat(40)),
            Some(CandidateStatus::Ignored)
        );
    }
}
