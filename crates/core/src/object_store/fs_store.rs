//! Filesystem-backed object store.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::config::ObjectStoreConfig;

use super::types::validate_key;
use super::{ListPage, ObjectInfo, ObjectStore, ObjectStoreError};

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Stores each object as a file under `root`, keys mapping to relative paths.
pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            page_size: config.page_size.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    async fn ensure_parent(path: &Path) -> Result<(), ObjectStoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".partial");
        path.with_file_name(name)
    }

    /// All keys under the directory containing `prefix`, unsorted.
    async fn collect_keys(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let base = match prefix.rfind('/') {
            Some(pos) => self.root.join(&prefix[..pos]),
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.extension().is_some_and(|ext| ext == "partial") {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<ObjectInfo, ObjectStoreError> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;

        let temp = Self::temp_path(&path);
        fs::write(&temp, &data).await?;
        fs::rename(&temp, &path).await?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: data.len() as u64,
            etag: sha256_hex(&data),
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                ObjectStoreError::Io(e)
            }
        })
    }

    async fn put_file(&self, key: &str, source: &Path) -> Result<ObjectInfo, ObjectStoreError> {
        let path = self.path_for(key)?;
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                ObjectStoreError::Io(e)
            }
        })?;
        Self::ensure_parent(&path).await?;

        let temp = Self::temp_path(&path);
        let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, source_file);
        let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, File::create(&temp).await?);
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            writer.write_all(&buffer[..read]).await?;
            total += read as u64;
        }
        writer.flush().await?;
        fs::rename(&temp, &path).await?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: total,
            etag: format!("{:x}", hasher.finalize()),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ListPage, ObjectStoreError> {
        let mut keys = self.collect_keys(prefix).await?;
        keys.sort();

        let start = match token {
            Some(after) => keys.partition_point(|k| k.as_str() <= after),
            None => 0,
        };
        let remaining = &keys[start..];
        let page: Vec<String> = remaining.iter().take(self.page_size).cloned().collect();
        let next_token = if remaining.len() > self.page_size {
            page.last().cloned()
        } else {
            None
        };

        Ok(ListPage {
            keys: page,
            next_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{delete_prefix, PrefixListing};
    use tempfile::TempDir;

    fn store(temp: &TempDir, page_size: usize) -> FsObjectStore {
        FsObjectStore::new(&ObjectStoreConfig {
            root: temp.path().to_path_buf(),
            page_size,
        })
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, 10);

        let info = store.put("m1/torrents/abc.torrent", b"d4:infoe".to_vec()).await.unwrap();
        assert_eq!(info.size_bytes, 8);
        assert_eq!(info.etag.len(), 64);
        assert_eq!(store.get("m1/torrents/abc.torrent").await.unwrap(), b"d4:infoe");
        assert!(store.exists("m1/torrents/abc.torrent").await.unwrap());

        store.delete("m1/torrents/abc.torrent").await.unwrap();
        store.delete("m1/torrents/abc.torrent").await.unwrap();
        assert!(matches!(
            store.get("m1/torrents/abc.torrent").await,
            Err(ObjectStoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_put_file_hashes_content() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("download.mkv");
        fs::write(&source, b"media bytes").await.unwrap();
        let store = store(&temp, 10);

        let info = store.put_file("m1/abc.mkv", &source).await.unwrap();
        assert_eq!(info.size_bytes, 11);
        assert_eq!(info.etag, sha256_hex(b"media bytes"));
        assert!(temp.path().join("m1/abc.mkv").exists());

        let missing = store.put_file("m1/x.mkv", &temp.path().join("nope")).await;
        assert!(matches!(missing, Err(ObjectStoreError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_paginated_listing() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, 2);
        for i in 0..5 {
            store
                .put(&format!("s1/1/torrents/{i}.torrent"), vec![i])
                .await
                .unwrap();
        }
        store.put("s1/1/other.mkv", vec![9]).await.unwrap();

        let mut listing = PrefixListing::new(&store, "s1/1/torrents/");
        let mut pages = Vec::new();
        while let Some(page) = listing.next_page().await.unwrap() {
            pages.push(page);
        }
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], vec!["s1/1/torrents/0.torrent", "s1/1/torrents/1.torrent"]);
        assert_eq!(pages[2], vec!["s1/1/torrents/4.torrent"]);

        let deleted = delete_prefix(&store, "s1/1/torrents/").await.unwrap();
        assert_eq!(deleted, 5);
        assert!(store.exists("s1/1/other.mkv").await.unwrap());
        let page = store.list_page("s1/1/torrents/", None).await.unwrap();
        assert!(page.keys.is_empty());
    }

    #[tokio::test]
    async fn test_listing_missing_prefix_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, 10);
        let page = store.list_page("nothing/here/", None).await.unwrap();
        assert_eq!(page, ListPage::default());
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp, 10);
        assert!(matches!(
            store.put("../outside", vec![]).await,
            Err(ObjectStoreError::InvalidKey { .. })
        ));
    }
}
