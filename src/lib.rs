pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod queue;

#[cfg(test)]
mod test_support;


pub use audio::{AudioPlayer, MediaPlayer};
pub use cache::AudioCache;
pub use error::*;
pub use models::*;
pub use queue::PlaylistSequencer;
