//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::metrics;

use super::metainfo::{hash_from_magnet, info_hash_from_bytes};
use super::{
    AddTorrentRequest, AddTorrentResult, FilePriority, TorrentClient, TorrentClientError,
    TorrentFile, TorrentInfo, TorrentState,
};

/// qBittorrent WebUI client.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set after a successful login; cleared when the daemon rejects the cookie.
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }

    fn default_save_path(&self) -> Option<String> {
        self.config
            .download_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }

    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .form(&params)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_request_error)?;

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        self.login().await
    }

    /// Send an authenticated request, logging in again once if the session
    /// was rejected. `build` is called per attempt since request bodies
    /// cannot be replayed.
    async fn send<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn() -> Result<RequestBuilder, TorrentClientError>,
    {
        self.ensure_authenticated().await?;
        metrics::EXTERNAL_REQUESTS
            .with_label_values(&["qbittorrent"])
            .inc();

        let mut response = build()?.send().await.map_err(map_request_error)?;

        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED
        ) {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = None;
            self.login().await?;
            response = build()?.send().await.map_err(map_request_error)?;
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(TorrentClientError::TorrentNotFound(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }

    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        let url = self.url(endpoint);
        self.send(|| Ok(self.client.get(&url))).await
    }

    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        let url = self.url(endpoint);
        self.send(|| Ok(self.client.post(&url).form(params))).await
    }

    fn add_form(
        &self,
        request: &AddTorrentRequest,
    ) -> Result<multipart::Form, TorrentClientError> {
        let (mut form, download_path, tags, paused) = match request {
            AddTorrentRequest::Magnet {
                uri,
                download_path,
                tags,
                paused,
            } => (
                multipart::Form::new().text("urls", uri.clone()),
                download_path,
                tags,
                *paused,
            ),
            AddTorrentRequest::TorrentFile {
                data,
                filename,
                download_path,
                tags,
                paused,
            } => {
                let part = multipart::Part::bytes(data.clone())
                    .file_name(filename.clone().unwrap_or_else(|| "file.torrent".to_string()))
                    .mime_str("application/x-bittorrent")
                    .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;
                (
                    multipart::Form::new().part("torrents", part),
                    download_path,
                    tags,
                    *paused,
                )
            }
        };

        if let Some(path) = download_path.clone().or_else(|| self.default_save_path()) {
            form = form.text("savepath", path);
        }
        if !tags.is_empty() {
            form = form.text("tags", tags.join(","));
        }
        if paused {
            // qBittorrent 5 renamed the flag; send both.
            form = form.text("paused", "true").text("stopped", "true");
        }
        Ok(form)
    }

    async fn post_tags(
        &self,
        endpoint: &str,
        hash: &str,
        tags: &[String],
    ) -> Result<(), TorrentClientError> {
        if tags.is_empty() {
            return Ok(());
        }
        let hash_lower = hash.to_lowercase();
        let joined = tags.join(",");
        self.post_form(endpoint, &[("hashes", &hash_lower), ("tags", &joined)])
            .await?;
        Ok(())
    }
}

fn map_request_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, TorrentClientError> {
    serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// Entry of `/api/v2/torrents/info`.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    /// Size of the selected files.
    size: i64,
    eta: i64,
    added_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    tags: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            // 8640000 is qBittorrent's "infinity".
            eta_secs: if self.eta > 0 && self.eta < 8640000 {
                Some(self.eta as u64)
            } else {
                None
            },
            added_at: timestamp_to_datetime(self.added_on),
            save_path: if self.save_path.is_empty() {
                None
            } else {
                Some(self.save_path)
            },
            tags: self
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        }
    }
}

/// Entry of `/api/v2/torrents/files`.
#[derive(Debug, Deserialize)]
struct QBTorrentFile {
    /// Missing on daemons older than 2.8.2; position is used instead.
    #[serde(default)]
    index: Option<u32>,
    name: String,
    size: i64,
    progress: f64,
    priority: i64,
}

#[derive(Debug, Deserialize)]
struct QBMainData {
    #[serde(default)]
    server_state: Option<QBServerState>,
}

#[derive(Debug, Deserialize)]
struct QBServerState {
    #[serde(default)]
    free_space_on_disk: i64,
}

fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "metaDL" | "forcedMetaDL" => TorrentState::FetchingMetadata,
        "downloading" | "forcedDL" | "allocating" => TorrentState::Downloading,
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

fn convert_files(files: Vec<QBTorrentFile>) -> Vec<TorrentFile> {
    files
        .into_iter()
        .enumerate()
        .map(|(position, f)| TorrentFile {
            index: f.index.unwrap_or(position as u32),
            name: f.name,
            size_bytes: f.size.max(0) as u64,
            progress: f.progress,
            priority: FilePriority::from_qb(f.priority),
        })
        .collect()
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let hash = match &request {
            AddTorrentRequest::Magnet { uri, .. } => hash_from_magnet(uri).ok_or_else(|| {
                TorrentClientError::InvalidTorrent(format!("No info hash in magnet: {}", uri))
            })?,
            AddTorrentRequest::TorrentFile { data, .. } => info_hash_from_bytes(data)?,
        };

        let url = self.url("/api/v2/torrents/add");
        let body = self
            .send(|| Ok(self.client.post(&url).multipart(self.add_form(&request)?)))
            .await?;

        if body.contains("Fails.") {
            return Err(TorrentClientError::ApiError(
                "qBittorrent refused the torrent".to_string(),
            ));
        }

        debug!(hash = %hash, "Torrent added to qBittorrent");
        Ok(AddTorrentResult { hash })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        let endpoint = format!(
            "/api/v2/torrents/info?hashes={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let torrents: Vec<QBTorrentInfo> = parse_json(&self.get(&endpoint).await?)?;

        torrents
            .into_iter()
            .next()
            .map(QBTorrentInfo::into_torrent_info)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        let endpoint = format!(
            "/api/v2/torrents/files?hash={}",
            urlencoding::encode(&hash.to_lowercase())
        );
        let body = match self.get(&endpoint).await {
            Err(TorrentClientError::TorrentNotFound(_)) => {
                return Err(TorrentClientError::TorrentNotFound(hash.to_string()))
            }
            other => other?,
        };
        Ok(convert_files(parse_json(&body)?))
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_indexes: &[u32],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError> {
        if file_indexes.is_empty() {
            return Ok(());
        }
        let hash_lower = hash.to_lowercase();
        let ids = file_indexes
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("|");
        let priority = priority.as_qb().to_string();
        self.post_form(
            "/api/v2/torrents/filePrio",
            &[("hash", &hash_lower), ("id", &ids), ("priority", &priority)],
        )
        .await?;
        Ok(())
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form("/api/v2/torrents/pause", &[("hashes", &hash_lower)])
            .await?;
        Ok(())
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form("/api/v2/torrents/resume", &[("hashes", &hash_lower)])
            .await?;
        Ok(())
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let delete_str = if delete_files { "true" } else { "false" };
        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", delete_str)],
        )
        .await?;
        Ok(())
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.post_tags("/api/v2/torrents/addTags", hash, tags).await
    }

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.post_tags("/api/v2/torrents/removeTags", hash, tags)
            .await
    }

    async fn free_space(&self) -> Result<u64, TorrentClientError> {
        let data: QBMainData = parse_json(&self.get("/api/v2/sync/maindata").await?)?;
        data.server_state
            .map(|s| s.free_space_on_disk.max(0) as u64)
            .ok_or_else(|| TorrentClientError::ApiError("maindata has no server_state".into()))
    }
}
