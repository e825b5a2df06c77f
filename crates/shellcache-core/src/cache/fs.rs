//! Filesystem-backed buckets.
//!
//! Layout: one directory per bucket under the cache root, one JSON document
//! per entry. Entry file names are the SHA-256 of the entry key, so every
//! resource path maps to a flat name of fixed length. The key itself is kept
//! inside the document.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::CacheStorage;
use crate::error::{Error, Result};
use crate::models::CachedResponse;

const ENTRY_EXTENSION: &str = "json";
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

/// On-disk document for one entry.
#[derive(Serialize)]
struct StoredEntry<'a> {
    key: &'a str,
    entry: &'a CachedResponse,
}

#[derive(Deserialize)]
struct LoadedEntry {
    key: String,
    entry: CachedResponse,
}

/// Only the key, for listing a bucket without decoding bodies.
#[derive(Deserialize)]
struct EntryKey {
    key: String,
}

pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    pub(crate) fn entry_path(&self, bucket: &str, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.bucket_path(bucket)
            .join(format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION))
    }

    fn is_entry_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
    }

    async fn read_key(path: &Path) -> Option<String> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) => {
                // Removed by a concurrent writer or bucket delete
                debug!(path = %path.display(), error = %e, "Cache entry vanished while listing");
                return None;
            }
        };
        match serde_json::from_slice::<EntryKey>(&contents) {
            Ok(doc) => Some(doc.key),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                None
            }
        }
    }
}

/// Write `contents` to a fresh temp file in `dir`, then rename it over `path`.
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)?;
    file.write_all(contents)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CacheStorage for FsStorage {
    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.bucket_path(bucket)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if !Self::is_entry_file(&path) {
                if !path.to_string_lossy().ends_with(TEMP_SUFFIX) {
                    warn!(path = %path.display(), "Ignoring unrecognized file in cache bucket");
                }
                continue;
            }
            if let Some(key) = Self::read_key(&path).await {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Option<CachedResponse>> {
        let contents = match tokio::fs::read(self.entry_path(bucket, key)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let doc: LoadedEntry = serde_json::from_slice(&contents).map_err(|e| Error::CorruptEntry {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if doc.key != key {
            return Err(Error::CorruptEntry {
                key: key.to_string(),
                reason: format!("entry file holds key {:?}", doc.key),
            });
        }
        Ok(Some(doc.entry))
    }

    async fn put(&self, bucket: &str, key: &str, entry: &CachedResponse) -> Result<()> {
        let dir = self.bucket_path(bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let path = self.entry_path(bucket, key);
        let contents = serde_json::to_vec(&StoredEntry { key, entry })?;

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &contents))
            .await
            .map_err(std::io::Error::other)??;

        debug!(bucket, key, bytes = entry.size(), "Stored cache entry");
        Ok(())
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.entry_path(bucket, key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<bool> {
        match tokio::fs::remove_dir_all(self.bucket_path(bucket)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_bucket(&self, bucket: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.bucket_path(bucket)).await?)
    }
}
