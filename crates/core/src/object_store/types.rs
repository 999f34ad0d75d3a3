//! Object store trait and listing helpers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid object key: {key}")]
    InvalidKey { key: String },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the content.
    pub etag: String,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in lexicographic order.
    pub keys: Vec<String>,
    /// Continuation token; `None` on the last page.
    pub next_token: Option<String>,
}

/// Flat key/value blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<ObjectInfo, ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Copy a local file into the store.
    async fn put_file(&self, key: &str, source: &Path) -> Result<ObjectInfo, ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Delete an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// List keys starting with `prefix`, resuming after `token`.
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ListPage, ObjectStoreError>;
}

/// Walks a prefix listing page by page.
pub struct PrefixListing<'a> {
    store: &'a dyn ObjectStore,
    prefix: String,
    token: Option<String>,
    exhausted: bool,
}

impl<'a> PrefixListing<'a> {
    pub fn new(store: &'a dyn ObjectStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            token: None,
            exhausted: false,
        }
    }

    /// Next page of keys, or `None` once the listing is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>, ObjectStoreError> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .store
            .list_page(&self.prefix, self.token.as_deref())
            .await?;
        self.exhausted = page.next_token.is_none();
        self.token = page.next_token;
        if page.keys.is_empty() && self.exhausted {
            return Ok(None);
        }
        Ok(Some(page.keys))
    }
}

/// Delete every object under `prefix`. Returns the number of deleted keys.
pub async fn delete_prefix(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<usize, ObjectStoreError> {
    // Collect first so deletions cannot shift the listing under the cursor.
    let mut keys = Vec::new();
    let mut listing = PrefixListing::new(store, prefix);
    while let Some(page) = listing.next_page().await? {
        keys.extend(page);
    }
    for key in &keys {
        store.delete(key).await?;
    }
    Ok(keys.len())
}

/// Reject keys that could escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        Err(ObjectStoreError::InvalidKey {
            key: key.to_string(),
        })
    } else {
        Ok(())
    }
}
