use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::audio::time::{format_current_time, format_total_time};

/// A downloaded copy of a remote audio file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub remote_url: String,
    pub local_path: PathBuf,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(remote_url: impl Into<String>, local_path: PathBuf) -> Self {
        Self {
            remote_url: remote_url.into(),
            local_path,
            cached_at: Utc::now(),
        }
    }
}

/// Cache hash -> entry. Serialized as a plain JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct CacheIndex {
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &str) -> Option<&CacheEntry> {
        self.entries.get(hash)
    }

    pub fn insert(&mut self, hash: String, entry: CacheEntry) {
        self.entries.insert(hash, entry);
    }

    pub fn remove(&mut self, hash: &str) -> Option<CacheEntry> {
        self.entries.remove(hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregate numbers about the cache directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Lifecycle phase of the player controller. The logical (remote) URI is
/// carried by every phase except `Empty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayerPhase {
    #[default]
    Empty,
    Loading(String),
    Idle(String),
    Playing(String),
}

impl PlayerPhase {
    pub fn uri(&self) -> Option<&str> {
        match self {
            PlayerPhase::Empty => None,
            PlayerPhase::Loading(uri) | PlayerPhase::Idle(uri) | PlayerPhase::Playing(uri) => {
                Some(uri)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerPhase::Empty => "empty",
            PlayerPhase::Loading(_) => "loading",
            PlayerPhase::Idle(_) => "idle",
            PlayerPhase::Playing(_) => "playing",
        }
    }
}

/// Observable snapshot of a player controller.
///
/// Everything here is derived from the playback primitive and refreshed on
/// every poll tick; command methods update it optimistically in between.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub phase: PlayerPhase,
    pub is_muted: bool,
    /// Volume remembered by the first mute, restored on unmute
    pub previous_volume: Option<f32>,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub current_time: String,
    pub total_time: String,
    pub progress: f32,
}

impl PlayerState {
    pub fn new() -> Self {
        Self {
            phase: PlayerPhase::Empty,
            is_muted: false,
            previous_volume: None,
            position_secs: 0.0,
            duration_secs: 0.0,
            current_time: format_current_time(0.0),
            total_time: format_total_time(f64::NAN),
            progress: 0.0,
        }
    }

    pub fn current_uri(&self) -> Option<&str> {
        self.phase.uri()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, PlayerPhase::Playing(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, PlayerPhase::Loading(_))
    }

    /// Recompute the display fields from raw primitive readings
    pub fn apply_timing(&mut self, position_secs: f64, duration_secs: f64) {
        self.position_secs = if position_secs.is_finite() { position_secs.max(0.0) } else { 0.0 };
        self.duration_secs = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        self.current_time = format_current_time(position_secs);
        self.total_time = format_total_time(duration_secs);
        self.progress = if self.duration_secs > 0.0 {
            (self.position_secs / self.duration_secs).clamp(0.0, 1.0) as f32
        } else {
            0.0
        };
    }

    /// Drop everything tied to a loaded source. Mute bookkeeping survives.
    pub fn clear_track(&mut self) {
        self.phase = PlayerPhase::Empty;
        self.apply_timing(0.0, f64::NAN);
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a `load_audio` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Source swapped and its duration became known
    Loaded,
    /// Source swapped but the duration never showed up within the attempt budget
    LoadedUnknownDuration,
    /// The same logical URI was already loaded
    AlreadyLoaded,
    /// Empty URI
    Ignored,
    /// The primitive rejected the source; the controller is back to `Empty`
    Failed,
}

impl LoadOutcome {
    /// Whether the requested source is now the loaded one
    pub fn is_loaded(&self) -> bool {
        matches!(
            self,
            LoadOutcome::Loaded | LoadOutcome::LoadedUnknownDuration | LoadOutcome::AlreadyLoaded
        )
    }

    /// Whether a loading transition actually happened and finished
    pub fn completed_loading(&self) -> bool {
        matches!(self, LoadOutcome::Loaded | LoadOutcome::LoadedUnknownDuration)
    }
}
