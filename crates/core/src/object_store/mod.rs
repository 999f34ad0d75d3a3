//! Object storage for `.torrent` bodies and cached media files.

mod fs_store;
mod types;

pub use fs_store::FsObjectStore;
pub use types::{delete_prefix, ListPage, ObjectInfo, ObjectStore, ObjectStoreError, PrefixListing};
