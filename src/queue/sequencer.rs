use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use super::Playlist;
use crate::audio::AudioPlayer;
use crate::config::PlaylistConfig;
use crate::logging::PlayerLogger;
use crate::models::LoadOutcome;

enum Selection {
    Reselected,
    Invalid,
    Changed {
        generation: u64,
        previous: Option<String>,
        url: String,
    },
}

/// Maps playlist selections onto load/play commands of one shared player
pub struct PlaylistSequencer {
    player: Arc<AudioPlayer>,
    playlist: Mutex<Playlist>,
    auto_play: bool,
    logger: PlayerLogger,
}

impl PlaylistSequencer {
    pub fn new(player: Arc<AudioPlayer>, config: &PlaylistConfig) -> Self {
        Self {
            player,
            playlist: Mutex::new(Playlist::new()),
            auto_play: config.auto_play,
            logger: PlayerLogger::new(),
        }
    }

    pub fn with_logger(mut self, logger: PlayerLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn player(&self) -> &Arc<AudioPlayer> {
        &self.player
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    fn playlist(&self) -> MutexGuard<'_, Playlist> {
        match self.playlist.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Replace the track list. Nothing is loaded until a track is selected.
    pub fn load_playlist(&self, urls: Vec<String>) {
        debug!("Loaded playlist with {} tracks", urls.len());
        self.playlist().replace(urls);
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.playlist().selected_index()
    }

    pub fn current_url(&self) -> Option<String> {
        self.playlist().current_url().map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.playlist().len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlist().is_empty()
    }

    /// Select the track at `index`.
    ///
    /// Re-selecting the current track toggles play/pause. Any other valid
    /// index stops the current track, then loads the new one and, with
    /// auto-play on, starts it once loading completes.
    pub async fn handle_audio_select(&self, index: usize) {
        let (generation, previous, url) = match self.begin_selection(index) {
            Selection::Reselected => {
                self.player.toggle_play_pause().await;
                return;
            }
            Selection::Invalid => return,
            Selection::Changed { generation, previous, url } => (generation, previous, url),
        };

        self.player.stop().await;
        self.logger.log_track_changed(previous.as_deref(), &url);
        self.load_selected(generation, &url).await;
    }

    fn begin_selection(&self, index: usize) -> Selection {
        let mut playlist = self.playlist();
        if playlist.selected_index() == Some(index) {
            return Selection::Reselected;
        }

        let previous = playlist.current_url().map(str::to_string);
        match playlist.select(index, self.auto_play) {
            Ok(generation) => Selection::Changed {
                generation,
                previous,
                url: playlist.current_url().unwrap_or_default().to_string(),
            },
            Err(e) => {
                warn!("Ignoring track selection: {}", e);
                Selection::Invalid
            }
        }
    }

    async fn load_selected(&self, generation: u64, url: &str) {
        let outcome = self.player.load_audio(url).await;
        if outcome == LoadOutcome::Failed {
            warn!("Track {} could not be loaded", url);
        }

        let fire = self.playlist().take_auto_play(generation);
        if fire && outcome.is_loaded() {
            self.player.play().await;
        }
    }

    /// Select the following track; stays put on the last one
    pub async fn next(&self) {
        let (target, selected) = {
            let playlist = self.playlist();
            (playlist.next_index(), playlist.selected_index())
        };
        if let Some(target) = target.filter(|t| Some(*t) != selected) {
            self.handle_audio_select(target).await;
        }
    }

    /// Select the preceding track; stays put on the first one
    pub async fn previous(&self) {
        let (target, selected) = {
            let playlist = self.playlist();
            (playlist.previous_index(), playlist.selected_index())
        };
        if let Some(target) = target.filter(|t| Some(*t) != selected) {
            self.handle_audio_select(target).await;
        }
    }

    /// Teardown: drop any armed auto-play and unload the player
    pub async fn shutdown(&self) {
        self.playlist().disarm();
        self.player.unload_audio().await;
    }
}
