//! Release indexer abstraction and the Radarr/Sonarr client.

mod arr;
mod types;

pub use arr::ArrIndexer;
pub use types::{IndexerError, IndexerRelease, IndexerService, Protocol};
