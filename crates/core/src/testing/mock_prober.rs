//! Mock media prober for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::prober::{MediaProber, ProbeError, ProbeResult};

/// Returns canned probe results keyed by file path. Unknown paths fail
/// with [`ProbeError::InputNotFound`].
#[derive(Debug, Default)]
pub struct MockProber {
    results: Arc<RwLock<HashMap<PathBuf, ProbeResult>>>,
    probed: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_result(&self, path: impl Into<PathBuf>, result: ProbeResult) {
        self.results.write().await.insert(path.into(), result);
    }

    /// Paths passed to `probe`, in call order.
    pub async fn probed(&self) -> Vec<PathBuf> {
        self.probed.read().await.clone()
    }
}

#[async_trait]
impl MediaProber for MockProber {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        self.probed.write().await.push(path.to_path_buf());
        self.results
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| ProbeError::InputNotFound {
                path: path.to_path_buf(),
            })
    }
}
