//! Durable key/value store behind the content cache.
//!
//! The cache only needs `get`, a bounded `batch_get` and `put` over string
//! keys and values. [`MemoryStore`] keeps everything in process;
//! [`FileStore`] keeps one file per key so entries survive restarts.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use trailcal_standardizer::BoxFuture;

/// Largest number of keys a single `batch_get` call accepts.
pub const MAX_BATCH_KEYS: usize = 100;

/// Errors returned by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A batch read asked for more keys than the store accepts.
    #[error("batch of {requested} keys exceeds the limit of {limit}")]
    BatchTooLarge { requested: usize, limit: usize },

    /// The key cannot be stored by this backend.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// IO error from a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// String key/value storage with no transactions and no cross-key ordering.
pub trait KvStore: Send + Sync {
    /// Reads one key.
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<String>>>;

    /// Reads up to [`MAX_BATCH_KEYS`] keys. Missing keys are absent from
    /// the returned map.
    fn batch_get(&self, keys: Vec<String>) -> BoxFuture<'_, StoreResult<HashMap<String, String>>>;

    /// Writes one key, replacing any previous value.
    fn put(&self, key: &str, value: String) -> BoxFuture<'_, StoreResult<()>>;
}

fn check_batch(keys: &[String]) -> StoreResult<()> {
    if keys.len() > MAX_BATCH_KEYS {
        return Err(StoreError::BatchTooLarge {
            requested: keys.len(),
            limit: MAX_BATCH_KEYS,
        });
    }
    Ok(())
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.entries.read().await.get(&key).cloned()) })
    }

    fn batch_get(&self, keys: Vec<String>) -> BoxFuture<'_, StoreResult<HashMap<String, String>>> {
        Box::pin(async move {
            check_batch(&keys)?;
            let entries = self.entries.read().await;
            Ok(keys
                .into_iter()
                .filter_map(|key| entries.get(&key).cloned().map(|value| (key, value)))
                .collect())
        })
    }

    fn put(&self, key: &str, value: String) -> BoxFuture<'_, StoreResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            self.entries.write().await.insert(key, value);
            Ok(())
        })
    }
}

/// Store keeping one `<key>.ics` file per entry under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.ics")))
    }

    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<String>>> {
        let key = key.to_string();
        Box::pin(async move { self.read(&key).await })
    }

    fn batch_get(&self, keys: Vec<String>) -> BoxFuture<'_, StoreResult<HashMap<String, String>>> {
        Box::pin(async move {
            check_batch(&keys)?;
            let mut found = HashMap::with_capacity(keys.len());
            for key in keys {
                if let Some(value) = self.read(&key).await? {
                    found.insert(key, value);
                }
            }
            trace!(found = found.len(), "Batch read from file store");
            Ok(found)
        })
    }

    fn put(&self, key: &str, value: String) -> BoxFuture<'_, StoreResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let path = self.path_for(&key)?;
            let dir = self.dir.clone();
            let target = path.clone();
            let prefix = format!(".{key}.");

            // Each write gets its own temp file; rename makes it visible whole.
            tokio::task::spawn_blocking(move || -> StoreResult<()> {
                std::fs::create_dir_all(&dir)?;
                let mut tmp = tempfile::Builder::new()
                    .prefix(&prefix)
                    .suffix(".tmp")
                    .tempfile_in(&dir)?;
                tmp.write_all(value.as_bytes())?;
                tmp.persist(&target).map_err(|e| e.error)?;
                Ok(())
            })
            .await
            .map_err(io::Error::other)??;

            debug!(key = %key, path = %path.display(), "Stored entry");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key{i}")).collect()
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert_eq!(store.get("a").await.unwrap(), None);

        store.put("a", "one".to_string()).await.unwrap();
        store.put("a", "two".to_string()).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some("two".to_string()));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn memory_store_batch_skips_missing() {
        let store = MemoryStore::new();
        store.put("key1", "v1".to_string()).await.unwrap();

        let found = store.batch_get(keys(3)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("key1"), Some(&"v1".to_string()));
    }

    #[tokio::test]
    async fn batch_limit_is_enforced() {
        let store = MemoryStore::new();
        assert!(store.batch_get(keys(MAX_BATCH_KEYS)).await.is_ok());

        let err = store.batch_get(keys(MAX_BATCH_KEYS + 1)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::BatchTooLarge {
                requested: 101,
                limit: 100
            }
        ));
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("events"));

        assert_eq!(store.get("abc123").await.unwrap(), None);
        store
            .put("abc123", "BEGIN:VEVENT\r\nEND:VEVENT\r\n".to_string())
            .await
            .unwrap();

        assert_eq!(
            store.get("abc123").await.unwrap().as_deref(),
            Some("BEGIN:VEVENT\r\nEND:VEVENT\r\n")
        );
        assert!(dir.path().join("events").join("abc123.ics").exists());

        let found = store
            .batch_get(vec!["abc123".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn file_store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.put("k1", "v".to_string()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["k1.ics".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn file_store_concurrent_writers_of_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        let value = "BEGIN:VEVENT\r\nSUMMARY:Easy 8mi\r\nEND:VEVENT\r\n".repeat(64);

        for round in 0..50 {
            let key = format!("k{round}");
            let writers: Vec<_> = (0..4)
                .map(|_| {
                    let (store, key, value) = (store.clone(), key.clone(), value.clone());
                    tokio::spawn(async move { store.put(&key, value).await })
                })
                .collect();
            let reader = {
                let (store, key) = (store.clone(), key.clone());
                tokio::spawn(async move { store.get(&key).await })
            };

            for writer in writers {
                writer.await.unwrap().unwrap();
            }
            if let Some(read) = reader.await.unwrap().unwrap() {
                assert_eq!(read, value);
            }
            assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(value.as_str()));
        }

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                let name = entry.as_ref().unwrap().file_name();
                !name.to_string_lossy().ends_with(".ics")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        for key in ["", "../escape", "a/b", "dot.key"] {
            assert!(matches!(
                store.put(key, "v".to_string()).await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }
}
