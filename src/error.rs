use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),
}

impl PlayerError {
    /// Get user-friendly error message with suggested solutions
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Cache(err) => err.user_message(),
            PlayerError::Audio(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
            PlayerError::Playlist(err) => err.user_message(),
            PlayerError::File(err) => format!("File system error: {}", err),
        }
    }

    /// Get suggested recovery actions for the error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlayerError::Cache(err) => err.recovery_suggestions(),
            PlayerError::Audio(err) => err.recovery_suggestions(),
            PlayerError::Config(err) => err.recovery_suggestions(),
            PlayerError::Playlist(err) => err.recovery_suggestions(),
            PlayerError::File(_) => vec!["Check file permissions and free disk space".to_string()],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Cache(err) => err.is_recoverable(),
            PlayerError::Audio(err) => err.is_recoverable(),
            PlayerError::Config(err) => err.is_recoverable(),
            PlayerError::Playlist(err) => err.is_recoverable(),
            PlayerError::File(_) => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Cache(CacheError::Http(_)) => ErrorSeverity::Warning,
            PlayerError::Cache(CacheError::BadStatus { .. }) => ErrorSeverity::Warning,
            PlayerError::Cache(_) => ErrorSeverity::Error,
            PlayerError::Audio(AudioError::SourceRejected { .. }) => ErrorSeverity::Error,
            PlayerError::Audio(_) => ErrorSeverity::Warning,
            PlayerError::Config(_) => ErrorSeverity::Warning,
            PlayerError::Playlist(_) => ErrorSeverity::Info,
            PlayerError::File(_) => ErrorSeverity::Error,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// Audio cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download of {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Index serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key-value store error: {0}")]
    Store(String),
}

impl CacheError {
    pub fn user_message(&self) -> String {
        match self {
            CacheError::Io(err) => format!("Cannot access the audio cache directory: {}", err),
            CacheError::Http(err) => format!("Network error while downloading audio: {}", err),
            CacheError::BadStatus { status, .. } => {
                format!("Audio server answered with status {}", status)
            }
            CacheError::Serialization(_) => "The audio cache index is corrupted".to_string(),
            CacheError::Store(msg) => format!("Cannot persist the audio cache index: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            CacheError::Io(_) => vec![
                "Check that the cache directory is writable".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            CacheError::Http(_) | CacheError::BadStatus { .. } => vec![
                "Check your network connection".to_string(),
                "The track will be streamed directly instead".to_string(),
            ],
            CacheError::Serialization(_) => vec![
                "Run 'audiocache clear' to rebuild the cache".to_string(),
            ],
            CacheError::Store(_) => vec![
                "Check permissions of the data directory".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            CacheError::Io(_) => false,
            CacheError::Http(_) => true,
            CacheError::BadStatus { .. } => true,
            CacheError::Serialization(_) => true, // index is rebuilt from scratch
            CacheError::Store(_) => true,
        }
    }
}

/// Errors reported by the platform playback primitive
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Source rejected: {source_uri}: {reason}")]
    SourceRejected { source_uri: String, reason: String },

    #[error("Playback command failed: {0}")]
    CommandFailed(String),
}

impl AudioError {
    pub fn user_message(&self) -> String {
        match self {
            AudioError::SourceRejected { source_uri, .. } => {
                format!("Audio '{}' could not be opened", source_uri)
            }
            AudioError::CommandFailed(msg) => format!("Audio playback interrupted: {}", msg),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            AudioError::SourceRejected { .. } => vec![
                "Check that the file is a supported audio format".to_string(),
                "Remove the cached copy and try again".to_string(),
            ],
            AudioError::CommandFailed(_) => vec![
                "Try pausing and resuming playback".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::SourceRejected { .. } => false,
            AudioError::CommandFailed(_) => true,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::ConfigDirNotFound => vec![
                "Check that you have write permissions to your home directory".to_string(),
            ],
            ConfigError::IoError(_) => vec![
                "Check file permissions for the configuration directory".to_string(),
                "Ensure the disk is not full".to_string(),
            ],
            ConfigError::SerializationError(_) => vec![
                "Try resetting configuration to defaults".to_string(),
            ],
            ConfigError::DeserializationError(_) => vec![
                "Delete the configuration file to reset to defaults".to_string(),
                "Check the configuration file format manually".to_string(),
            ],
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true // defaults are always available
    }
}

/// Playlist selection errors
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("Playlist is empty")]
    EmptyPlaylist,

    #[error("Invalid index: {index} (playlist has {len} tracks)")]
    InvalidIndex { index: usize, len: usize },
}

impl PlaylistError {
    pub fn user_message(&self) -> String {
        match self {
            PlaylistError::EmptyPlaylist => "No tracks in playlist".to_string(),
            PlaylistError::InvalidIndex { index, .. } => {
                format!("Track number {} is not valid for current playlist", index + 1)
            }
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PlaylistError::EmptyPlaylist => vec!["Load a playlist first".to_string()],
            PlaylistError::InvalidIndex { len, .. } => {
                vec![format!("Choose a track between 1 and {}", len)]
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        true
    }
}
