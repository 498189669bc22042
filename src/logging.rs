use log::{info, warn, error, debug, trace};
use std::time::{Duration, Instant};
use std::sync::{Arc, Mutex};
use std::collections::VecDeque;
use chrono::{DateTime, Utc};

/// Environment variable consulted by [`PlayerLogger::init`]
pub const LOG_LEVEL_ENV: &str = "AUDIO_PLAYLIST_LOG_LEVEL";

/// Cache or playback event kept for diagnostics
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: PlayerEventType,
    pub duration: Option<Duration>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventType {
    CacheHit,
    CacheMiss,
    DownloadCompleted,
    DownloadFailed,
    CachePruned,
    TrackLoaded,
    LoadTimedOut,
    PlaybackStarted,
    PlaybackPaused,
    PlaybackStopped,
    TrackChanged,
    PrimitiveError,
}

impl PlayerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerEventType::CacheHit => "CACHE_HIT",
            PlayerEventType::CacheMiss => "CACHE_MISS",
            PlayerEventType::DownloadCompleted => "DOWNLOAD_COMPLETED",
            PlayerEventType::DownloadFailed => "DOWNLOAD_FAILED",
            PlayerEventType::CachePruned => "CACHE_PRUNED",
            PlayerEventType::TrackLoaded => "TRACK_LOADED",
            PlayerEventType::LoadTimedOut => "LOAD_TIMED_OUT",
            PlayerEventType::PlaybackStarted => "PLAYBACK_STARTED",
            PlayerEventType::PlaybackPaused => "PLAYBACK_PAUSED",
            PlayerEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            PlayerEventType::TrackChanged => "TRACK_CHANGED",
            PlayerEventType::PrimitiveError => "PRIMITIVE_ERROR",
        }
    }
}

/// Logger for cache and playback operations.
///
/// Every event goes to the `log` facade and into a bounded in-memory history,
/// which clones share.
#[derive(Clone)]
pub struct PlayerLogger {
    events: Arc<Mutex<VecDeque<PlayerEvent>>>,
    max_events: usize,
}

impl PlayerLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events,
        }
    }

    /// Initialize the `env_logger` backend with a timestamped format
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV)
            .unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;

        info!("Logging initialized with level: {}", log_level);
        Ok(())
    }

    pub fn log_event(&self, event_type: PlayerEventType, details: String, duration: Option<Duration>) {
        match event_type {
            PlayerEventType::CacheHit | PlayerEventType::CacheMiss | PlayerEventType::CachePruned => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::DownloadCompleted => {
                info!("[{}] {} (took: {:?})", event_type.as_str(), details, duration);
            }
            PlayerEventType::TrackLoaded
            | PlayerEventType::PlaybackStarted
            | PlayerEventType::PlaybackPaused
            | PlayerEventType::PlaybackStopped
            | PlayerEventType::TrackChanged => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::DownloadFailed | PlayerEventType::LoadTimedOut => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::PrimitiveError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = PlayerEvent {
            timestamp: Utc::now(),
            event_type,
            duration,
            details,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_cache_hit(&self, url: &str) {
        self.log_event(PlayerEventType::CacheHit, format!("Serving cached copy of {}", url), None);
    }

    pub fn log_cache_miss(&self, url: &str) {
        self.log_event(PlayerEventType::CacheMiss, format!("No cached copy of {}", url), None);
    }

    pub fn log_download_completed(&self, url: &str, elapsed: Duration) {
        self.log_event(
            PlayerEventType::DownloadCompleted,
            format!("Downloaded {}", url),
            Some(elapsed),
        );
    }

    pub fn log_download_failed(&self, url: &str, reason: &str) {
        self.log_event(
            PlayerEventType::DownloadFailed,
            format!("Download of {} failed ({}), streaming remote URL instead", url, reason),
            None,
        );
    }

    pub fn log_cache_pruned(&self, pruned: usize) {
        self.log_event(
            PlayerEventType::CachePruned,
            format!("Pruned {} entries with missing files", pruned),
            None,
        );
    }

    pub fn log_track_loaded(&self, uri: &str, duration_secs: f64, elapsed: Duration) {
        self.log_event(
            PlayerEventType::TrackLoaded,
            format!("Loaded {} ({:.1}s)", uri, duration_secs),
            Some(elapsed),
        );
    }

    pub fn log_load_timed_out(&self, uri: &str, attempts: u32) {
        self.log_event(
            PlayerEventType::LoadTimedOut,
            format!("Duration of {} unknown after {} attempts", uri, attempts),
            None,
        );
    }

    pub fn log_playback_started(&self, uri: &str) {
        self.log_event(PlayerEventType::PlaybackStarted, format!("Playing {}", uri), None);
    }

    pub fn log_playback_paused(&self, position_secs: f64) {
        self.log_event(
            PlayerEventType::PlaybackPaused,
            format!("Playback paused at position: {:.2}s", position_secs),
            None,
        );
    }

    pub fn log_playback_stopped(&self, reason: &str) {
        self.log_event(
            PlayerEventType::PlaybackStopped,
            format!("Playback stopped: {}", reason),
            None,
        );
    }

    pub fn log_track_changed(&self, from_track: Option<&str>, to_track: &str) {
        let details = match from_track {
            Some(from) => format!("Track changed from '{}' to '{}'", from, to_track),
            None => format!("Track selected: '{}'", to_track),
        };
        self.log_event(PlayerEventType::TrackChanged, details, None);
    }

    pub fn log_primitive_error(&self, operation: &str, error: &dyn std::fmt::Display) {
        self.log_event(
            PlayerEventType::PrimitiveError,
            format!("{} failed: {}", operation, error),
            None,
        );
    }

    /// Get recent events for debugging, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlayerEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn get_event_statistics(&self) -> EventStatistics {
        let mut stats = EventStatistics::default();
        let Ok(events) = self.events.lock() else {
            return stats;
        };

        for event in events.iter() {
            match event.event_type {
                PlayerEventType::CacheHit => stats.cache_hits += 1,
                PlayerEventType::CacheMiss => stats.cache_misses += 1,
                PlayerEventType::DownloadCompleted => stats.downloads += 1,
                PlayerEventType::DownloadFailed => stats.download_failures += 1,
                PlayerEventType::PrimitiveError => stats.primitive_errors += 1,
                _ => {}
            }
        }

        stats.total_events = events.len();
        stats
    }
}

impl Default for PlayerLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about logged events
#[derive(Debug, Clone, Default)]
pub struct EventStatistics {
    pub total_events: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub downloads: usize,
    pub download_failures: usize,
    pub primitive_errors: usize,
}

/// Timer utility for measuring operation durations
pub struct OperationTimer {
    start_time: Instant,
    operation_name: String,
}

impl OperationTimer {
    pub fn new(operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        trace!("Starting operation: {}", operation_name);
        Self {
            start_time: Instant::now(),
            operation_name,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(self) -> Duration {
        let duration = self.elapsed();
        trace!("Completed operation '{}' in {}ms", self.operation_name, duration.as_millis());
        duration
    }
}
