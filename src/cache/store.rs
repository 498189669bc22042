use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs as tokio_fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::error::CacheError;

/// Device file system as seen by the audio cache
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn create_dir_all(&self, path: &Path) -> Result<(), CacheError>;

    /// Fetch `url` into `dest`, returning the transport status code.
    ///
    /// `dest` must only exist afterwards if the status was a success.
    async fn download(&self, url: &str, dest: &Path) -> Result<u16, CacheError>;

    async fn remove_file(&self, path: &Path) -> Result<(), CacheError>;

    async fn file_size(&self, path: &Path) -> Option<u64>;
}

/// `tokio::fs` + `reqwest` implementation
pub struct HttpFileStore {
    client: reqwest::Client,
}

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

impl HttpFileStore {
    pub fn new(timeout: Duration) -> Result<Self, CacheError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Unique sibling of `dest` the body is streamed into before the rename
    fn part_path(dest: &Path) -> PathBuf {
        let n = PART_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".{}-{}.part", std::process::id(), n));
        dest.with_file_name(name)
    }

    async fn stream_to(&self, resp: reqwest::Response, part: &Path) -> Result<u64, CacheError> {
        let file = tokio_fs::File::create(part).await?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        writer.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl FileStore for HttpFileStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio_fs::try_exists(path).await.unwrap_or(false)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), CacheError> {
        tokio_fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u16, CacheError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(status.as_u16());
        }

        let part = Self::part_path(dest);
        match self.stream_to(resp, &part).await {
            Ok(written) => {
                tokio_fs::rename(&part, dest).await?;
                debug!("Wrote {} bytes to {:?}", written, dest);
                Ok(status.as_u16())
            }
            Err(e) => {
                if let Err(cleanup) = tokio_fs::remove_file(&part).await {
                    warn!("Could not remove partial download {:?}: {}", part, cleanup);
                }
                Err(e)
            }
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<(), CacheError> {
        match tokio_fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn file_size(&self, path: &Path) -> Option<u64> {
        tokio_fs::metadata(path).await.ok().map(|m| m.len())
    }
}

/// Small durable string store (flags, the cache index)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// All keys kept in one JSON object file
pub struct FileKeyValueStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileKeyValueStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, CacheError> {
        match tokio_fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio_fs::write(&tmp, content).await?;
        tokio_fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let _guard = self.lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let values = self
            .values
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| CacheError::Store(e.to_string()))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("kv.json");
        let store = FileKeyValueStore::new(path.clone());

        assert_eq!(store.get("flag").await.unwrap(), None);

        store.set("flag", "on").await.unwrap();
        store.set("other", "1").await.unwrap();
        assert!(path.exists());

        // A second instance reads what the first wrote
        let reopened = FileKeyValueStore::new(path);
        assert_eq!(reopened.get("flag").await.unwrap(), Some("on".to_string()));

        reopened.remove("flag").await.unwrap();
        assert_eq!(store.get("flag").await.unwrap(), None);
        assert_eq!(store.get("other").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kv.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FileKeyValueStore::new(path);
        match store.get("anything").await {
            Err(CacheError::Serialization(_)) => {}
            other => panic!("Expected Serialization error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_http_file_store_local_ops() {
        let temp_dir = TempDir::new().unwrap();
        let store = HttpFileStore::new(Duration::from_secs(5)).unwrap();
        let dir = temp_dir.path().join("a").join("b");

        store.create_dir_all(&dir).await.unwrap();
        assert!(store.exists(&dir).await);

        let file = dir.join("x.mp3");
        assert!(!store.exists(&file).await);
        assert_eq!(store.file_size(&file).await, None);

        std::fs::write(&file, b"1234").unwrap();
        assert_eq!(store.file_size(&file).await, Some(4));

        store.remove_file(&file).await.unwrap();
        assert!(!store.exists(&file).await);
        // Removing twice is fine
        store.remove_file(&file).await.unwrap();
    }

    #[test]
    fn test_part_paths_are_unique_siblings() {
        let dest = Path::new("/cache/audio/abc.mp3");
        let a = HttpFileStore::part_path(dest);
        let b = HttpFileStore::part_path(dest);
        assert_ne!(a, b);
        assert_eq!(a.parent(), dest.parent());
        assert!(a.to_string_lossy().ends_with(".part"));
    }
}
