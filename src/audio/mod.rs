pub mod controller;
pub mod time;

use crate::error::AudioError;

pub use controller::AudioPlayer;
pub use time::{format_current_time, format_total_time};

/// Platform playback primitive.
///
/// The primitive is authoritative for the playing flag, position and
/// duration. `duration` is not guaranteed to be known right after `replace`;
/// callers must treat NaN, infinite or zero as "not yet known".
pub trait MediaPlayer: Send + Sync {
    /// Whether audio is currently coming out
    fn playing(&self) -> bool;

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Total duration in seconds
    fn duration(&self) -> f64;

    /// Output volume (0.0 to 1.0)
    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32) -> Result<(), AudioError>;

    fn play(&self) -> Result<(), AudioError>;

    fn pause(&self) -> Result<(), AudioError>;

    /// Swap the loaded source. The previous source cannot be released otherwise.
    fn replace(&self, source: &str) -> Result<(), AudioError>;

    fn seek_to(&self, seconds: f64) -> Result<(), AudioError>;
}
