//! In-memory object store for testing.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::object_store::{ListPage, ObjectInfo, ObjectStore, ObjectStoreError};

/// Keeps objects in a sorted map. `put_file` does not read the source: it
/// stores an empty body and remembers the path for assertions.
#[derive(Debug)]
pub struct MockObjectStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    sources: Arc<RwLock<BTreeMap<String, PathBuf>>>,
    page_size: usize,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::with_page_size(2)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            sources: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: page_size.max(1),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// Local path a key was uploaded from with `put_file`.
    pub async fn source_of(&self, key: &str) -> Option<PathBuf> {
        self.sources.read().await.get(key).cloned()
    }

    fn info(key: &str, data: &[u8]) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            etag: format!("{:x}", Sha256::digest(data)),
        }
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<ObjectInfo, ObjectStoreError> {
        let info = Self::info(key, &data);
        self.objects.write().await.insert(key.to_string(), data);
        Ok(info)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<ObjectInfo, ObjectStoreError> {
        self.sources
            .write()
            .await
            .insert(key.to_string(), source.to_path_buf());
        self.put(key, Vec::new()).await
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.write().await.remove(key);
        self.sources.write().await.remove(key);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ListPage, ObjectStoreError> {
        let objects = self.objects.read().await;
        let mut matching = objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| token.is_none_or(|t| k.as_str() > t));
        let keys: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let next_token = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };
        Ok(ListPage { keys, next_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::delete_prefix;

    #[tokio::test]
    async fn test_paged_prefix_delete() {
        let store = MockObjectStore::with_page_size(2);
        for key in ["a/1", "a/2", "a/3", "b/1"] {
            store.put(key, b"x".to_vec()).await.unwrap();
        }
        let first = store.list_page("a/", None).await.unwrap();
        assert_eq!(first.keys, vec!["a/1", "a/2"]);
        assert_eq!(first.next_token.as_deref(), Some("a/2"));

        assert_eq!(delete_prefix(&store, "a/").await.unwrap(), 3);
        assert_eq!(store.keys().await, vec!["b/1"]);
    }
}
