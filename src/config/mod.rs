use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

/// Directory name used under the platform config/cache/data roots
pub const APP_DIR_NAME: &str = "audio-playlist";

/// Key-value file holding the persisted cache index, kept under `cache_root`
pub const INDEX_FILE_NAME: &str = "state.json";

/// Audio cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Platform cache root; audio files live under `{cache_root}/{audio_subdir}`
    pub cache_root: PathBuf,
    /// App document area. URIs already under here are never re-cached.
    pub document_root: PathBuf,
    pub audio_subdir: String,
    /// Key the index is persisted under in the key-value store
    pub index_key: String,
    pub request_timeout_secs: u64,
}

impl CacheConfig {
    /// Cache rooted at an explicit directory, with the document area beside it
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            cache_root: root.join("cache"),
            document_root: root.join("documents"),
            ..Default::default()
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.cache_root.join(&self.audio_subdir)
    }

    /// Where the index lives; moves with `cache_root` so two roots never share one
    pub fn index_path(&self) -> PathBuf {
        self.cache_root.join(INDEX_FILE_NAME)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_root: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME),
            document_root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR_NAME),
            audio_subdir: "audio".to_string(),
            index_key: "@audio_cache/index".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Player controller timings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub poll_interval_ms: u64,
    pub duration_poll_attempts: u32,
    pub duration_poll_interval_ms: u64,
    /// Volume applied after every successful load
    pub default_volume: f32,
}

impl PlayerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn duration_poll_interval(&self) -> Duration {
        Duration::from_millis(self.duration_poll_interval_ms)
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            duration_poll_attempts: 50,
            duration_poll_interval_ms: 100,
            default_volume: 1.0,
        }
    }
}

/// Playlist sequencer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Start playback as soon as a newly selected track finishes loading
    pub auto_play: bool,
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub player: PlayerConfig,
    pub playlist: PlaylistConfig,
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: AppConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        Self::with_path(config_path)
    }

    /// Load from an explicit file, falling back to defaults when it is missing or unreadable
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring unreadable config {:?}: {}", config_path, e);
                AppConfig::default()
            }
        };

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_default_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.player.default_volume = volume.clamp(0.0, 1.0);
        self.save_config()
    }

    pub fn set_auto_play(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.playlist.auto_play = enabled;
        self.save_config()
    }

    pub fn set_cache_root(&mut self, root: PathBuf) -> Result<(), ConfigError> {
        self.config.cache.cache_root = root;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = AppConfig::default();
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(APP_DIR_NAME);

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}
