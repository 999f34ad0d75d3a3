//! Mock download-locator resolver for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::discovery::{LocatorError, LocatorResolver, ResolvedLocator};

/// Resolves only the URLs it was told about; anything else is a 404.
#[derive(Debug, Default)]
pub struct MockLocatorResolver {
    responses: Arc<RwLock<HashMap<String, ResolvedLocator>>>,
    resolved: Arc<RwLock<Vec<String>>>,
}

impl MockLocatorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, url: &str, locator: ResolvedLocator) {
        self.responses
            .write()
            .await
            .insert(url.to_string(), locator);
    }

    /// URLs passed to `resolve`, in call order.
    pub async fn resolved(&self) -> Vec<String> {
        self.resolved.read().await.clone()
    }
}

#[async_trait]
impl LocatorResolver for MockLocatorResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedLocator, LocatorError> {
        self.resolved.write().await.push(url.to_string());
        self.responses
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| LocatorError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}
