//! Key/value stores
//!
//! Keys are `/`-separated relative paths such as
//! `contracts/<address>/holdings/<asset>/<address>`. Values are opaque bytes;
//! entity crates store JSON through [`get_json`] / [`put_json`].

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// Persistence seam used by every entity repository
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the value stored under `key`
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove `key`. Returns whether a value was present.
    async fn remove(&self, key: &str) -> StorageResult<bool>;

    /// List every key beginning with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Read and decode a JSON value
pub async fn get_json<T: DeserializeOwned>(store: &dyn Store, key: &str) -> StorageResult<Option<T>> {
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub async fn put_json<T: Serialize + ?Sized>(store: &dyn Store, key: &str, value: &T) -> StorageResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, bytes).await
}

fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// In-memory store (tests and ephemeral nodes)
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_key(key)?;
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// Filesystem store: one JSON file per key under a base directory
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a new file store at the given path
    pub async fn new(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    async fn walk(&self, dir: PathBuf, keys: &mut Vec<String>) -> StorageResult<()> {
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if path.extension().map_or(false, |ext| ext == "json") {
                    if let Ok(relative) = path.with_extension("").strip_prefix(&self.base_path) {
                        let key = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy().into_owned())
                            .collect::<Vec<_>>()
                            .join("/");
                        keys.push(key);
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Atomic replace through a sibling temp file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, bytes = value.len(), "stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        // Walk from the deepest directory fully named by the prefix
        let dir_part = match prefix.rfind('/') {
            Some(pos) => &prefix[..pos],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.base_path.clone()
        } else {
            validate_key(dir_part)?;
            self.base_path.join(dir_part)
        };

        let mut keys = Vec::new();
        self.walk(start, &mut keys).await?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        value: u64,
    }

    async fn exercise(store: &dyn Store) {
        assert!(store.get("a/b").await.unwrap().is_none());

        put_json(store, "a/b", &Record { name: "x".into(), value: 1 }).await.unwrap();
        put_json(store, "a/c", &Record { name: "y".into(), value: 2 }).await.unwrap();
        put_json(store, "b/a", &Record { name: "z".into(), value: 3 }).await.unwrap();

        let record: Record = get_json(store, "a/b").await.unwrap().unwrap();
        assert_eq!(record.value, 1);

        assert_eq!(store.list("a/").await.unwrap(), vec!["a/b".to_string(), "a/c".to_string()]);
        assert_eq!(store.list("b/").await.unwrap().len(), 1);

        assert!(store.remove("a/b").await.unwrap());
        assert!(!store.remove("a/b").await.unwrap());
        assert_eq!(store.list("a/").await.unwrap(), vec!["a/c".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        exercise(&store).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path()).await.unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let store = MemoryStore::new();
        for key in ["", "/abs", "a//b", "a/../b"] {
            assert!(matches!(
                store.put(key, vec![]).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
