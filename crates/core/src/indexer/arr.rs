//! Radarr/Sonarr release API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{ArrConfig, IndexerConfig};
use crate::metrics;

use super::{IndexerError, IndexerRelease, IndexerService, Protocol};

/// Queries Radarr for movies and Sonarr for show seasons.
pub struct ArrIndexer {
    client: Client,
    radarr: Option<ArrConfig>,
    sonarr: Option<ArrConfig>,
}

impl ArrIndexer {
    pub fn new(config: IndexerConfig) -> Result<Self, IndexerError> {
        let timeout = config
            .radarr
            .iter()
            .chain(config.sonarr.iter())
            .map(|c| c.timeout_secs)
            .max()
            .unwrap_or(30);
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(timeout)))
            .build()
            .map_err(|e| IndexerError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            radarr: config.radarr,
            sonarr: config.sonarr,
        })
    }

    fn build_release_url(config: &ArrConfig, title_indexer_id: i64, season: Option<u32>) -> String {
        let base = config.url.trim_end_matches('/');
        match season {
            None => format!("{base}/api/v3/release?movieId={title_indexer_id}"),
            Some(season) => format!(
                "{base}/api/v3/release?seriesId={title_indexer_id}&seasonNumber={season}"
            ),
        }
    }
}

#[async_trait]
impl IndexerService for ArrIndexer {
    async fn get_releases(
        &self,
        title_indexer_id: i64,
        season: Option<u32>,
    ) -> Result<Vec<IndexerRelease>, IndexerError> {
        let (service, config) = match season {
            None => ("radarr", self.radarr.as_ref()),
            Some(_) => ("sonarr", self.sonarr.as_ref()),
        };
        let config = config.ok_or_else(|| IndexerError::NotConfigured(service.to_string()))?;
        let url = Self::build_release_url(config, title_indexer_id, season);
        debug!(service, title_indexer_id, ?season, "Fetching releases");
        metrics::EXTERNAL_REQUESTS.with_label_values(&[service]).inc();

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &config.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IndexerError::Timeout
                } else if e.is_connect() {
                    IndexerError::ConnectionFailed(e.to_string())
                } else {
                    IndexerError::ApiError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexerError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let releases: Vec<ArrRelease> = response
            .json()
            .await
            .map_err(|e| IndexerError::ApiError(format!("Failed to parse response: {}", e)))?;

        debug!(service, results = releases.len(), "Release fetch complete");
        Ok(releases.into_iter().map(IndexerRelease::from).collect())
    }
}

// Radarr/Sonarr API response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrRelease {
    guid: String,
    title: String,
    #[serde(default)]
    protocol: Option<Protocol>,
    quality: ArrQualityModel,
    #[serde(default)]
    age_minutes: Option<f64>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    seeders: Option<i64>,
    #[serde(default)]
    custom_format_score: i32,
    #[serde(default)]
    languages: Vec<ArrLanguage>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    magnet_url: Option<String>,
    #[serde(default)]
    info_hash: Option<String>,
    #[serde(default)]
    indexer: Option<String>,
    #[serde(default)]
    info_url: Option<String>,
    #[serde(default)]
    comment_url: Option<String>,
    #[serde(default)]
    rejections: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArrQualityModel {
    quality: ArrQuality,
}

#[derive(Debug, Deserialize)]
struct ArrQuality {
    name: String,
    #[serde(default)]
    resolution: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ArrLanguage {
    name: String,
}

impl From<ArrRelease> for IndexerRelease {
    fn from(r: ArrRelease) -> Self {
        let unknown_title = r
            .rejections
            .iter()
            .any(|rej| rej.to_lowercase().contains("unknown"));
        Self {
            guid: r.guid,
            title: r.title,
            protocol: r.protocol.unwrap_or(Protocol::Unknown),
            quality_name: r.quality.quality.name,
            resolution_hint: r.quality.quality.resolution.filter(|h| *h > 0),
            age_seconds: r.age_minutes.map(|m| (m.max(0.0) * 60.0) as u64),
            size_bytes: r.size,
            seeders: r.seeders.map(|s| s.clamp(0, i64::from(u32::MAX)) as u32),
            custom_format_score: r.custom_format_score,
            languages: r.languages.into_iter().map(|l| l.name).collect(),
            download_url: r.download_url.filter(|u| !u.is_empty()),
            magnet_url: r.magnet_url.filter(|u| !u.is_empty()),
            info_hash: r.info_hash.filter(|h| !h.is_empty()).map(|h| h.to_lowercase()),
            indexer_name: r.indexer,
            info_url: r.info_url.filter(|u| !u.is_empty()),
            comment_url: r.comment_url.filter(|u| !u.is_empty()),
            unknown_title,
        }
    }
}
