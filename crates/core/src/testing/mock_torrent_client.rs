//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    hash_from_magnet, info_hash_from_bytes, AddTorrentRequest, AddTorrentResult, FilePriority,
    TorrentClient, TorrentClientError, TorrentFile, TorrentInfo, TorrentState,
};

#[derive(Debug, Clone)]
struct MockSession {
    info: TorrentInfo,
    files: Vec<TorrentFile>,
}

/// Mock implementation of the TorrentClient trait.
///
/// Torrents only reveal files that were registered for their hash with
/// [`MockTorrentClient::register_torrent`]; an unregistered magnet never
/// finishes fetching metadata.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.register_torrent(&hash, vec![fixtures::torrent_file(0, "Movie.mkv", 1000)]).await;
///
/// // ... run an acquisition pass, which adds the session ...
///
/// client.set_file_progress(&hash, 0, 1.0).await;
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    sessions: Arc<RwLock<HashMap<String, MockSession>>>,
    /// Files revealed once a torrent with the hash is added.
    registered: Arc<RwLock<HashMap<String, Vec<TorrentFile>>>>,
    added: Arc<RwLock<Vec<AddTorrentRequest>>>,
    removed: Arc<RwLock<Vec<String>>>,
    tags_added: Arc<RwLock<Vec<(String, Vec<String>)>>>,
    tags_removed: Arc<RwLock<Vec<(String, Vec<String>)>>>,
    free_space: Arc<RwLock<u64>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
    save_path: String,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            registered: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            removed: Arc::new(RwLock::new(Vec::new())),
            tags_added: Arc::new(RwLock::new(Vec::new())),
            tags_removed: Arc::new(RwLock::new(Vec::new())),
            free_space: Arc::new(RwLock::new(1024 * 1024 * 1024 * 1024)),
            next_error: Arc::new(RwLock::new(None)),
            save_path: "/mock/downloads".to_string(),
        }
    }

    pub fn save_path(&self) -> &str {
        &self.save_path
    }

    /// Declare the files a torrent exposes once its metadata is known.
    pub async fn register_torrent(&self, hash: &str, files: Vec<TorrentFile>) {
        self.registered
            .write()
            .await
            .insert(hash.to_lowercase(), files);
    }

    pub async fn set_file_progress(&self, hash: &str, index: u32, progress: f64) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&hash.to_lowercase()) {
            if let Some(file) = session.files.iter_mut().find(|f| f.index == index) {
                file.progress = progress.clamp(0.0, 1.0);
            }
        }
    }

    pub async fn set_state(&self, hash: &str, state: TorrentState) {
        if let Some(session) = self.sessions.write().await.get_mut(&hash.to_lowercase()) {
            session.info.state = state;
        }
    }

    pub async fn set_added_at(&self, hash: &str, added_at: DateTime<Utc>) {
        if let Some(session) = self.sessions.write().await.get_mut(&hash.to_lowercase()) {
            session.info.added_at = Some(added_at);
        }
    }

    pub async fn set_eta(&self, hash: &str, eta_secs: Option<u64>) {
        if let Some(session) = self.sessions.write().await.get_mut(&hash.to_lowercase()) {
            session.info.eta_secs = eta_secs;
        }
    }

    pub async fn set_free_space(&self, bytes: u64) {
        *self.free_space.write().await = bytes;
    }

    /// Set an error to be returned on the next operation.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn added_torrents(&self) -> Vec<AddTorrentRequest> {
        self.added.read().await.clone()
    }

    /// Hashes passed to `remove_torrent`, in call order.
    pub async fn removed(&self) -> Vec<String> {
        self.removed.read().await.clone()
    }

    /// `(hash, tags)` pairs passed to `add_tags`, in call order.
    pub async fn tags_added(&self) -> Vec<(String, Vec<String>)> {
        self.tags_added.read().await.clone()
    }

    /// `(hash, tags)` pairs passed to `remove_tags`, in call order.
    pub async fn tags_removed(&self) -> Vec<(String, Vec<String>)> {
        self.tags_removed.read().await.clone()
    }

    pub async fn session_tags(&self, hash: &str) -> Vec<String> {
        self.sessions
            .read()
            .await
            .get(&hash.to_lowercase())
            .map(|s| s.info.tags.clone())
            .unwrap_or_default()
    }

    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.sessions
            .read()
            .await
            .contains_key(&hash.to_lowercase())
    }

    pub async fn file_priorities(&self, hash: &str) -> Vec<FilePriority> {
        self.sessions
            .read()
            .await
            .get(&hash.to_lowercase())
            .map(|s| s.files.iter().map(|f| f.priority).collect())
            .unwrap_or_default()
    }

    async fn take_error(&self) -> Result<(), TorrentClientError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn with_session<T>(
        &self,
        hash: &str,
        f: impl FnOnce(&mut MockSession) -> T,
    ) -> Result<T, TorrentClientError> {
        self.take_error().await?;
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(&hash.to_lowercase())
            .map(f)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }
}

/// Progress over the files that are not skipped.
fn selected_progress(files: &[TorrentFile]) -> f64 {
    let (done, total) = files
        .iter()
        .filter(|f| f.priority != FilePriority::Skip)
        .fold((0.0, 0u64), |(done, total), f| {
            (done + f.size_bytes as f64 * f.progress, total + f.size_bytes)
        });
    if total == 0 {
        0.0
    } else {
        done / total as f64
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        self.take_error().await?;

        let (hash, paused) = match &request {
            AddTorrentRequest::Magnet { uri, paused, .. } => (
                hash_from_magnet(uri)
                    .ok_or_else(|| TorrentClientError::InvalidTorrent(uri.clone()))?,
                *paused,
            ),
            AddTorrentRequest::TorrentFile { data, paused, .. } => {
                (info_hash_from_bytes(data)?, *paused)
            }
        };
        self.added.write().await.push(request.clone());

        let files = self
            .registered
            .read()
            .await
            .get(&hash)
            .cloned()
            .unwrap_or_default();
        let mut sessions = self.sessions.write().await;
        sessions.entry(hash.clone()).or_insert_with(|| MockSession {
            info: TorrentInfo {
                hash: hash.clone(),
                name: format!("torrent-{}", &hash[..8.min(hash.len())]),
                state: if paused {
                    TorrentState::Paused
                } else {
                    TorrentState::Downloading
                },
                progress: 0.0,
                size_bytes: files.iter().map(|f| f.size_bytes).sum(),
                eta_secs: None,
                added_at: Some(Utc::now()),
                save_path: Some(self.save_path.clone()),
                tags: request.tags().to_vec(),
            },
            files,
        });

        Ok(AddTorrentResult { hash })
    }

    async fn get_torrent(&self, hash: &str) -> Result<TorrentInfo, TorrentClientError> {
        self.with_session(hash, |session| {
            let mut info = session.info.clone();
            info.progress = selected_progress(&session.files);
            info
        })
        .await
    }

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError> {
        self.with_session(hash, |session| session.files.clone()).await
    }

    async fn set_file_priority(
        &self,
        hash: &str,
        file_indexes: &[u32],
        priority: FilePriority,
    ) -> Result<(), TorrentClientError> {
        self.with_session(hash, |session| {
            for file in session
                .files
                .iter_mut()
                .filter(|f| file_indexes.contains(&f.index))
            {
                file.priority = priority;
            }
        })
        .await
    }

    async fn pause_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.with_session(hash, |session| session.info.state = TorrentState::Paused)
            .await
    }

    async fn resume_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.with_session(hash, |session| session.info.state = TorrentState::Downloading)
            .await
    }

    async fn remove_torrent(
        &self,
        hash: &str,
        _delete_files: bool,
    ) -> Result<(), TorrentClientError> {
        self.take_error().await?;
        self.removed.write().await.push(hash.to_lowercase());
        match self.sessions.write().await.remove(&hash.to_lowercase()) {
            Some(_) => Ok(()),
            None => Err(TorrentClientError::TorrentNotFound(hash.to_string())),
        }
    }

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.tags_added
            .write()
            .await
            .push((hash.to_lowercase(), tags.to_vec()));
        self.with_session(hash, |session| {
            for tag in tags {
                if !session.info.tags.contains(tag) {
                    session.info.tags.push(tag.clone());
                }
            }
        })
        .await
    }

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError> {
        self.tags_removed
            .write()
            .await
            .push((hash.to_lowercase(), tags.to_vec()));
        self.with_session(hash, |session| session.info.tags.retain(|t| !tags.contains(t)))
            .await
    }

    async fn free_space(&self) -> Result<u64, TorrentClientError> {
        self.take_error().await?;
        Ok(*self.free_space.read().await)
    }
}
