pub mod acquisition;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod indexer;
pub mod job;
pub mod metrics;
pub mod object_store;
pub mod prober;
pub mod release;
pub mod testing;
pub mod title;
pub mod torrent_client;

pub use acquisition::{AcquisitionError, AcquisitionJob, AcquisitionReport};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use discovery::{DiscoveryError, DiscoveryJob, DiscoveryReport};
pub use indexer::{ArrIndexer, IndexerError, IndexerRelease, IndexerService};
pub use job::{Deadline, JobError, JobOutcome, JobRequest, Supervisor, SweepReport};
pub use object_store::{FsObjectStore, ObjectStore, ObjectStoreError};
pub use prober::{FfprobeProber, MediaProber, ProbeError, ProbeResult};
pub use title::{SlotKey, SqliteTitleStore, Title, TitleStore, TitleStoreError};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError};
