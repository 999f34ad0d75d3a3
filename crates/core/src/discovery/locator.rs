//! Resolution of indexer download URLs into magnets or `.torrent` bodies.

use async_trait::async_trait;
use reqwest::{redirect, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::metrics;

/// What an HTTP download locator points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedLocator {
    Magnet(String),
    TorrentFile(Vec<u8>),
}

#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Too many redirects for {0}")]
    TooManyRedirects(String),

    #[error("Request timed out")]
    Timeout,
}

#[async_trait]
pub trait LocatorResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<ResolvedLocator, LocatorError>;
}

/// Follows at most one redirect. A redirect to a magnet URI is returned
/// without fetching anything further.
pub struct HttpLocatorResolver {
    client: Client,
}

impl HttpLocatorResolver {
    pub fn new(timeout: Duration) -> Result<Self, LocatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| LocatorError::RequestFailed(e.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::Response, LocatorError> {
        metrics::EXTERNAL_REQUESTS
            .with_label_values(&["locator"])
            .inc();
        self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                LocatorError::Timeout
            } else {
                LocatorError::RequestFailed(e.to_string())
            }
        })
    }
}

fn redirect_target(response: &reqwest::Response) -> Option<String> {
    if !response.status().is_redirection() {
        return None;
    }
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

async fn body(response: reqwest::Response, url: &str) -> Result<Vec<u8>, LocatorError> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(LocatorError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    response
        .bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|e| LocatorError::RequestFailed(e.to_string()))
}

#[async_trait]
impl LocatorResolver for HttpLocatorResolver {
    async fn resolve(&self, url: &str) -> Result<ResolvedLocator, LocatorError> {
        if url.starts_with("magnet:") {
            return Ok(ResolvedLocator::Magnet(url.to_string()));
        }

        let response = self.fetch(url).await?;
        let Some(target) = redirect_target(&response) else {
            return body(response, url).await.map(ResolvedLocator::TorrentFile);
        };

        if target.starts_with("magnet:") {
            debug!(url = %url, "Locator redirected to magnet");
            return Ok(ResolvedLocator::Magnet(target));
        }

        let target = response
            .url()
            .join(&target)
            .map(|u| u.to_string())
            .unwrap_or(target);
        let second = self.fetch(&target).await?;
        if second.status().is_redirection() {
            return Err(LocatorError::TooManyRedirects(url.to_string()));
        }
        body(second, &target).await.map(ResolvedLocator::TorrentFile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_magnet_passthrough() {
        let resolver = HttpLocatorResolver::new(Duration::from_secs(1)).unwrap();
        let magnet = format!("magnet:?xt=urn:btih:{}", "a".repeat(40));
        assert_eq!(
            resolver.resolve(&magnet).await.unwrap(),
            ResolvedLocator::Magnet(magnet)
        );
    }
}
