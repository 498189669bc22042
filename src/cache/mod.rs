pub mod store;

pub use store::{FileKeyValueStore, FileStore, HttpFileStore, KeyValueStore, MemoryKeyValueStore};

use log::{debug, info, warn};
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::logging::{OperationTimer, PlayerLogger};
use crate::models::{CacheEntry, CacheIndex, CacheStats};

/// Extensions kept as-is for cached files; anything else is stored as `mp3`
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "webm"];

pub const DEFAULT_EXTENSION: &str = "mp3";

const FILE_SCHEME: &str = "file://";

/// Cache key and file stem for a remote URL
pub fn cache_hash(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// File extension for the cached copy, taken from the URL path
pub fn audio_extension(url: &str) -> &'static str {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(&['?', '#'][..]).next().unwrap_or_default().to_string(),
    };

    let ext = Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    ext.and_then(|e| AUDIO_EXTENSIONS.iter().copied().find(|known| *known == e))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Disk-backed cache of remote audio files.
///
/// Maps remote URLs to downloaded copies under `{cache_root}/audio`. The first
/// request for a URL downloads it; later requests are served from disk while
/// the file is still there. The index is persisted through a [`KeyValueStore`]
/// so warm starts skip re-downloading.
///
/// Every public operation degrades instead of failing: a download that does
/// not succeed yields the original URL so the player can stream it directly.
pub struct AudioCache {
    config: CacheConfig,
    fs: Arc<dyn FileStore>,
    store: Arc<dyn KeyValueStore>,
    index: Mutex<CacheIndex>,
    init: OnceCell<()>,
    logger: PlayerLogger,
}

impl AudioCache {
    pub fn new(config: CacheConfig, fs: Arc<dyn FileStore>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            fs,
            store,
            index: Mutex::new(CacheIndex::new()),
            init: OnceCell::new(),
            logger: PlayerLogger::new(),
        }
    }

    /// Cache using the HTTP file store and the index file under `cache_root`
    pub fn with_defaults(config: CacheConfig) -> Result<Self, CacheError> {
        let fs = Arc::new(HttpFileStore::new(config.request_timeout())?);
        Ok(Self::with_index_file(config, fs))
    }

    /// Cache over `fs` whose index is persisted at [`CacheConfig::index_path`]
    pub fn with_index_file(config: CacheConfig, fs: Arc<dyn FileStore>) -> Self {
        let store = Arc::new(FileKeyValueStore::new(config.index_path()));
        Self::new(config, fs, store)
    }

    pub fn with_logger(mut self, logger: PlayerLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.config.audio_dir()
    }

    /// Create the cache directory, load the persisted index and prune
    /// entries whose files are gone. Concurrent callers share one run.
    pub async fn initialize(&self) {
        self.init.get_or_init(|| self.run_initialization()).await;
    }

    async fn run_initialization(&self) {
        let audio_dir = self.audio_dir();
        if let Err(e) = self.fs.create_dir_all(&audio_dir).await {
            warn!("Could not create audio cache directory {:?}: {}", audio_dir, e);
        }

        let loaded = match self.load_index().await {
            Ok(index) => index,
            Err(e) => {
                warn!("Discarding unreadable audio cache index: {}", e);
                CacheIndex::new()
            }
        };
        info!("Audio cache initialized at {:?} with {} entries", audio_dir, loaded.len());
        *self.index.lock().await = loaded;

        self.prune_missing().await;
    }

    async fn load_index(&self) -> Result<CacheIndex, CacheError> {
        match self.store.get(&self.config.index_key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(CacheIndex::new()),
        }
    }

    async fn persist(&self, index: &CacheIndex) {
        let result = match serde_json::to_string(index) {
            Ok(raw) => self.store.set(&self.config.index_key, &raw).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            warn!("Could not persist audio cache index: {}", e);
        }
    }

    /// Drop every entry whose file no longer exists; returns how many went
    async fn prune_missing(&self) -> usize {
        let mut index = self.index.lock().await;

        let mut missing = Vec::new();
        for (hash, entry) in index.entries.iter() {
            if !self.fs.exists(&entry.local_path).await {
                missing.push(hash.clone());
            }
        }

        for hash in &missing {
            index.remove(hash);
        }

        if !missing.is_empty() {
            self.logger.log_cache_pruned(missing.len());
            self.persist(&index).await;
        }
        missing.len()
    }

    /// Re-run the validation pass on demand
    pub async fn verify(&self) -> usize {
        self.initialize().await;
        self.prune_missing().await
    }

    /// Whether `url` is indexed and its file currently exists on disk
    pub async fn is_cached(&self, url: &str) -> bool {
        self.initialize().await;
        let path = {
            let index = self.index.lock().await;
            match index.get(&cache_hash(url)) {
                Some(entry) => entry.local_path.clone(),
                None => return false,
            }
        };
        self.fs.exists(&path).await
    }

    /// Whether `uri` already points inside the app's own storage
    pub fn is_local(&self, uri: &str) -> bool {
        let path = Path::new(uri.strip_prefix(FILE_SCHEME).unwrap_or(uri));
        path.is_absolute()
            && (path.starts_with(&self.config.cache_root) || path.starts_with(&self.config.document_root))
    }

    /// Destination of the cached copy for `url`
    pub fn local_path_for(&self, url: &str) -> PathBuf {
        self.audio_dir()
            .join(format!("{}.{}", cache_hash(url), audio_extension(url)))
    }

    /// Resolve `url` to something playable: the cached file when there is
    /// one, a fresh download otherwise, and `url` itself when downloading
    /// fails or the URI is already local.
    pub async fn get_audio_uri(&self, url: &str) -> String {
        if url.is_empty() || self.is_local(url) {
            return url.to_string();
        }

        self.initialize().await;
        let hash = cache_hash(url);

        if let Some(path) = self.valid_entry(&hash).await {
            self.logger.log_cache_hit(url);
            return path.to_string_lossy().into_owned();
        }
        self.logger.log_cache_miss(url);

        match self.download(url, &hash).await {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                self.logger.log_download_failed(url, &e.to_string());
                url.to_string()
            }
        }
    }

    /// Path of a live entry. A dangling one is pruned on the spot.
    async fn valid_entry(&self, hash: &str) -> Option<PathBuf> {
        let path = self.index.lock().await.get(hash)?.local_path.clone();
        if self.fs.exists(&path).await {
            return Some(path);
        }

        debug!("Cached file {:?} is gone, dropping its entry", path);
        let mut index = self.index.lock().await;
        if index.remove(hash).is_some() {
            self.persist(&index).await;
        }
        None
    }

    async fn download(&self, url: &str, hash: &str) -> Result<PathBuf, CacheError> {
        let dest = self.local_path_for(url);
        let timer = OperationTimer::new(format!("download {}", url));

        let status = self.fs.download(url, &dest).await?;
        if !(200..300).contains(&status) {
            return Err(CacheError::BadStatus {
                url: url.to_string(),
                status,
            });
        }
        self.logger.log_download_completed(url, timer.finish());

        let mut index = self.index.lock().await;
        index.insert(hash.to_string(), CacheEntry::new(url, dest.clone()));
        self.persist(&index).await;

        Ok(dest)
    }

    /// Drop the entry for `url` and delete its file
    pub async fn remove(&self, url: &str) -> bool {
        self.initialize().await;
        let mut index = self.index.lock().await;
        let Some(entry) = index.remove(&cache_hash(url)) else {
            return false;
        };

        if let Err(e) = self.fs.remove_file(&entry.local_path).await {
            warn!("Could not delete cached file {:?}: {}", entry.local_path, e);
        }
        self.persist(&index).await;
        true
    }

    /// Delete every cached file and persist an empty index
    pub async fn clear(&self) -> usize {
        self.initialize().await;
        let mut index = self.index.lock().await;
        let removed = index.len();

        for entry in index.entries.values() {
            if let Err(e) = self.fs.remove_file(&entry.local_path).await {
                warn!("Could not delete cached file {:?}: {}", entry.local_path, e);
            }
        }

        *index = CacheIndex::new();
        self.persist(&index).await;
        info!("Cleared {} cached audio files", removed);
        removed
    }

    /// Snapshot of the index, sorted by cache time
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.initialize().await;
        let mut entries: Vec<_> = self.index.lock().await.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.cached_at);
        entries
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries().await;
        let mut stats = CacheStats {
            entries: entries.len(),
            total_bytes: 0,
        };
        for entry in &entries {
            stats.total_bytes += self.fs.file_size(&entry.local_path).await.unwrap_or(0);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeFileStore;
    use tempfile::TempDir;

    fn create_test_cache() -> (AudioCache, Arc<FakeFileStore>, Arc<MemoryKeyValueStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let fs = Arc::new(FakeFileStore::new());
        let store = Arc::new(MemoryKeyValueStore::new());
        let cache = AudioCache::new(
            CacheConfig::rooted_at(temp_dir.path()),
            fs.clone(),
            store.clone(),
        );
        (cache, fs, store, temp_dir)
    }

    const URL: &str = "https://cdn.example.com/program/day-01.m4a?token=abc";

    #[test]
    fn test_cache_hash_is_deterministic() {
        assert_eq!(cache_hash(URL), cache_hash(URL));
        assert_ne!(cache_hash(URL), cache_hash("https://cdn.example.com/other.mp3"));
        assert_eq!(cache_hash(URL).len(), 64);
    }

    #[test]
    fn test_audio_extension() {
        assert_eq!(audio_extension(URL), "m4a");
        assert_eq!(audio_extension("https://x.io/a.WAV"), "wav");
        assert_eq!(audio_extension("https://x.io/a.flac"), "mp3");
        assert_eq!(audio_extension("https://x.io/stream"), "mp3");
        assert_eq!(audio_extension("not a url/track.ogg?x=1"), "ogg");
    }

    #[tokio::test]
    async fn test_second_request_served_from_disk() {
        let (cache, fs, _store, _temp_dir) = create_test_cache();

        let first = cache.get_audio_uri(URL).await;
        let second = cache.get_audio_uri(URL).await;

        assert_eq!(fs.download_count(), 1);
        assert_eq!(first, second);
        assert!(first.ends_with(".m4a"));
        assert!(first.starts_with(cache.audio_dir().to_string_lossy().as_ref()));
        assert!(cache.is_cached(URL).await);
    }

    #[tokio::test]
    async fn test_deleted_file_is_downloaded_again() {
        let (cache, fs, _store, _temp_dir) = create_test_cache();

        let path = cache.get_audio_uri(URL).await;
        fs.delete(Path::new(&path));

        assert!(!cache.is_cached(URL).await);
        let again = cache.get_audio_uri(URL).await;
        assert_eq!(again, path);
        assert_eq!(fs.download_count(), 2);
        assert!(cache.is_cached(URL).await);
    }

    #[tokio::test]
    async fn test_failed_download_falls_back_to_remote() {
        let (cache, fs, store, _temp_dir) = create_test_cache();
        fs.fail_with_status(503);

        assert_eq!(cache.get_audio_uri(URL).await, URL);
        assert!(!cache.is_cached(URL).await);
        assert!(store.get("@audio_cache/index").await.unwrap().is_none());

        fs.fail_with_transport_error();
        assert_eq!(cache.get_audio_uri(URL).await, URL);
        assert!(cache.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_passthrough_uris() {
        let (cache, fs, _store, temp_dir) = create_test_cache();

        assert_eq!(cache.get_audio_uri("").await, "");

        let local = temp_dir.path().join("documents").join("intro.mp3");
        let local = local.to_string_lossy().into_owned();
        assert_eq!(cache.get_audio_uri(&local).await, local);

        let file_uri = format!("file://{}", local);
        assert_eq!(cache.get_audio_uri(&file_uri).await, file_uri);

        assert_eq!(fs.download_count(), 0);
    }

    #[tokio::test]
    async fn test_index_persisted_and_reloaded() {
        let (cache, fs, store, temp_dir) = create_test_cache();
        let path = cache.get_audio_uri(URL).await;

        let raw = store.get("@audio_cache/index").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value[cache_hash(URL)];
        assert_eq!(entry["remoteUrl"], URL);
        assert_eq!(entry["localPath"], path.as_str());
        assert!(entry["cachedAt"].is_i64());

        // Warm start on the same disk and store
        let warm = AudioCache::new(CacheConfig::rooted_at(temp_dir.path()), fs.clone(), store.clone());
        assert!(warm.is_cached(URL).await);
        assert_eq!(warm.get_audio_uri(URL).await, path);
        assert_eq!(fs.download_count(), 1);
    }

    #[tokio::test]
    async fn test_initialization_prunes_missing_files() {
        let (cache, fs, store, temp_dir) = create_test_cache();
        let kept = cache.get_audio_uri(URL).await;
        let gone = cache.get_audio_uri("https://cdn.example.com/gone.mp3").await;
        fs.delete(Path::new(&gone));

        let warm = AudioCache::new(CacheConfig::rooted_at(temp_dir.path()), fs.clone(), store.clone());
        warm.initialize().await;

        let entries = warm.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].local_path, PathBuf::from(&kept));

        let raw = store.get("@audio_cache/index").await.unwrap().unwrap();
        let persisted: CacheIndex = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_initialization_runs_once() {
        let (cache, fs, _store, _temp_dir) = create_test_cache();
        let cache = Arc::new(cache);

        let ((), (), cached) =
            tokio::join!(cache.initialize(), cache.initialize(), cache.is_cached(URL));
        assert!(!cached);
        assert_eq!(fs.mkdir_count(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_discarded() {
        let (cache, _fs, store, _temp_dir) = create_test_cache();
        store.set("@audio_cache/index", "[[[").await.unwrap();

        cache.initialize().await;
        assert!(cache.entries().await.is_empty());
        assert_ne!(cache.get_audio_uri(URL).await, URL);
    }

    #[tokio::test]
    async fn test_remove_clear_and_stats() {
        let (cache, fs, _store, _temp_dir) = create_test_cache();
        let a = cache.get_audio_uri(URL).await;
        cache.get_audio_uri("https://cdn.example.com/b.mp3").await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 2 * FakeFileStore::BODY.len() as u64);

        assert!(cache.remove(URL).await);
        assert!(!cache.remove(URL).await);
        assert!(!fs.contains(Path::new(&a)));

        assert_eq!(cache.clear().await, 1);
        assert_eq!(cache.stats().await, CacheStats::default());
    }

    #[tokio::test]
    async fn test_overridden_root_keeps_its_own_index() {
        let temp_dir = TempDir::new().unwrap();
        let fs = Arc::new(FakeFileStore::new());
        let config = CacheConfig::rooted_at(temp_dir.path());

        let default_cache = AudioCache::with_index_file(config.clone(), fs.clone());
        let default_path = default_cache.get_audio_uri(URL).await;
        assert!(config.index_path().exists());

        let overridden = CacheConfig {
            cache_root: temp_dir.path().join("override"),
            ..config
        };
        let cache = AudioCache::with_index_file(overridden.clone(), fs.clone());

        assert!(!cache.is_cached(URL).await);
        assert_eq!(cache.clear().await, 0);
        assert!(fs.contains(Path::new(&default_path)));

        let path = cache.get_audio_uri(URL).await;
        assert!(Path::new(&path).starts_with(overridden.audio_dir()));
        assert_eq!(fs.download_count(), 2);

        assert_eq!(cache.clear().await, 1);
        assert!(fs.contains(Path::new(&default_path)));
        assert!(default_cache.is_cached(URL).await);
    }

    #[tokio::test]
    async fn test_verify_reports_pruned() {
        let (cache, fs, _store, _temp_dir) = create_test_cache();
        let path = cache.get_audio_uri(URL).await;
        assert_eq!(cache.verify().await, 0);

        fs.delete(Path::new(&path));
        assert_eq!(cache.verify().await, 1);
        assert!(cache.entries().await.is_empty());
    }
}
