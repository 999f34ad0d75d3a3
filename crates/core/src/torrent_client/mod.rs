//! Torrent client abstraction.
//!
//! The acquisition state machine drives download sessions through the
//! `TorrentClient` trait; qBittorrent is the supported backend.

mod metainfo;
mod qbittorrent;
mod types;

pub use metainfo::{hash_from_magnet, info_hash_from_bytes};
pub use qbittorrent::QBittorrentClient;
pub use types::*;
