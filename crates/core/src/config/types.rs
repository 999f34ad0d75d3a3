use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub indexer: IndexerConfig,
    pub torrent_client: TorrentClientConfig,
    #[serde(default)]
    pub prober: ProberConfig,
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub job: JobConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("releasekeeper.db")
}

/// Indexer backends. Movies go through Radarr, shows through Sonarr.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub radarr: Option<ArrConfig>,
    #[serde(default)]
    pub sonarr: Option<ArrConfig>,
}

/// A Radarr/Sonarr-style API endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArrConfig {
    /// Server URL (e.g., "http://localhost:7878")
    pub url: String,
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentClientConfig {
    pub qbittorrent: QBittorrentConfig,
}

/// qBittorrent WebUI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// WebUI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    /// Save path for new torrents (daemon default when unset)
    #[serde(default)]
    pub download_path: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Media prober configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProberConfig {
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u32,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_probe_timeout() -> u32 {
    120
}

/// Filesystem object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectStoreConfig {
    pub root: PathBuf,
    /// Keys returned per listing page (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    1000
}

const GIB: u64 = 1024 * 1024 * 1024;

/// Acquisition engine constants
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// Free space that must remain after a file finishes downloading
    #[serde(default = "default_disk_safety_margin")]
    pub disk_safety_margin_bytes: u64,
    /// Age after which a stalled or slow session is dropped
    #[serde(default = "default_stall_age")]
    pub stall_age_secs: u64,
    #[serde(default = "default_max_eta")]
    pub max_eta_secs: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Allowed relative deviation of media duration from the title runtime
    #[serde(default = "default_runtime_tolerance")]
    pub runtime_tolerance: f64,
    #[serde(default = "default_metadata_poll_interval")]
    pub metadata_poll_interval_ms: u64,
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
    /// Prefix of the tag put on every torrent session this engine creates
    #[serde(default = "default_session_tag_prefix")]
    pub session_tag_prefix: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            disk_safety_margin_bytes: default_disk_safety_margin(),
            stall_age_secs: default_stall_age(),
            max_eta_secs: default_max_eta(),
            max_file_size_bytes: default_max_file_size(),
            runtime_tolerance: default_runtime_tolerance(),
            metadata_poll_interval_ms: default_metadata_poll_interval(),
            metadata_timeout_secs: default_metadata_timeout(),
            session_tag_prefix: default_session_tag_prefix(),
        }
    }
}

fn default_disk_safety_margin() -> u64 {
    20 * GIB
}

fn default_stall_age() -> u64 {
    6 * 60 * 60
}

fn default_max_eta() -> u64 {
    24 * 60 * 60
}

fn default_max_file_size() -> u64 {
    60 * GIB
}

fn default_runtime_tolerance() -> f64 {
    0.2
}

fn default_metadata_poll_interval() -> u64 {
    1000
}

fn default_metadata_timeout() -> u64 {
    60
}

fn default_session_tag_prefix() -> String {
    "releasekeeper".to_string()
}

/// Discovery filters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// Candidates with this many seeders or fewer are rejected
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
    #[serde(default = "default_staleness_window")]
    pub staleness_window_days: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_seeders: default_min_seeders(),
            staleness_window_days: default_staleness_window(),
        }
    }
}

fn default_min_seeders() -> u32 {
    1
}

fn default_staleness_window() -> u32 {
    90
}

/// Job budget and supervisor fan-out
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default = "default_budget")]
    pub budget_secs: u64,
    #[serde(default = "default_max_concurrent_titles")]
    pub max_concurrent_titles: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            budget_secs: default_budget(),
            max_concurrent_titles: default_max_concurrent_titles(),
        }
    }
}

fn default_budget() -> u64 {
    840
}

fn default_max_concurrent_titles() -> usize {
    4
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub indexer: SanitizedIndexerConfig,
    pub torrent_client: SanitizedTorrentClientConfig,
    pub prober: ProberConfig,
    pub object_store: ObjectStoreConfig,
    pub acquisition: AcquisitionConfig,
    pub discovery: DiscoveryConfig,
    pub job: JobConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedIndexerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radarr: Option<SanitizedArrConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sonarr: Option<SanitizedArrConfig>,
}

/// Sanitized Arr config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedArrConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTorrentClientConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_path: Option<PathBuf>,
    pub timeout_secs: u32,
}

impl From<&ArrConfig> for SanitizedArrConfig {
    fn from(arr: &ArrConfig) -> Self {
        Self {
            url: arr.url.clone(),
            api_key_configured: !arr.api_key.is_empty(),
            timeout_secs: arr.timeout_secs,
        }
    }
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let qbit = &config.torrent_client.qbittorrent;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            indexer: SanitizedIndexerConfig {
                radarr: config.indexer.radarr.as_ref().map(SanitizedArrConfig::from),
                sonarr: config.indexer.sonarr.as_ref().map(SanitizedArrConfig::from),
            },
            torrent_client: SanitizedTorrentClientConfig {
                url: qbit.url.clone(),
                username: qbit.username.clone(),
                password_configured: !qbit.password.is_empty(),
                download_path: qbit.download_path.clone(),
                timeout_secs: qbit.timeout_secs,
            },
            prober: config.prober.clone(),
            object_store: config.object_store.clone(),
            acquisition: config.acquisition.clone(),
            discovery: config.discovery.clone(),
            job: config.job.clone(),
        }
    }
}
