use log::{debug, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use super::time::is_known_duration;
use super::MediaPlayer;
use crate::cache::AudioCache;
use crate::config::PlayerConfig;
use crate::logging::{OperationTimer, PlayerLogger};
use crate::models::{LoadOutcome, PlayerPhase, PlayerState};

/// State shared with the poll task
struct Shared {
    primitive: Arc<dyn MediaPlayer>,
    state: watch::Sender<PlayerState>,
}

impl Shared {
    fn snapshot(&self) -> PlayerState {
        self.state.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut PlayerState)) {
        self.state.send_modify(f);
    }

    /// One poll tick. Returns false once nothing is loaded.
    fn reconcile(&self) -> bool {
        match self.state.borrow().phase {
            PlayerPhase::Empty => return false,
            // Timings of a source that is being swapped in are meaningless
            PlayerPhase::Loading(_) => return true,
            PlayerPhase::Idle(_) | PlayerPhase::Playing(_) => {}
        }

        let playing = self.primitive.playing();
        let position = self.primitive.current_time();
        let duration = self.primitive.duration();

        let mut loaded = true;
        self.state.send_if_modified(|state| {
            let uri = match &state.phase {
                PlayerPhase::Empty => {
                    loaded = false;
                    return false;
                }
                PlayerPhase::Loading(_) => return false,
                PlayerPhase::Idle(uri) | PlayerPhase::Playing(uri) => uri.clone(),
            };

            let before = state.clone();
            state.phase = if playing {
                PlayerPhase::Playing(uri)
            } else {
                PlayerPhase::Idle(uri)
            };
            state.apply_timing(position, duration);
            *state != before
        });
        loaded
    }
}

/// Playback controller with cache-aware loading and polled state.
///
/// Commands update the published [`PlayerState`] optimistically; a poll task
/// re-reads the primitive on a fixed interval and is the only path that
/// guarantees the state eventually matches it. All commands go through one
/// async lock, so a `play()` can never reach the primitive while a
/// `load_audio()` is still swapping sources.
pub struct AudioPlayer {
    shared: Arc<Shared>,
    cache: Option<Arc<AudioCache>>,
    config: PlayerConfig,
    commands: tokio::sync::Mutex<()>,
    poller: Mutex<Option<JoinHandle<()>>>,
    logger: PlayerLogger,
}

impl AudioPlayer {
    pub fn new(primitive: Arc<dyn MediaPlayer>, config: PlayerConfig) -> Self {
        let (state, _) = watch::channel(PlayerState::new());
        Self {
            shared: Arc::new(Shared { primitive, state }),
            cache: None,
            config,
            commands: tokio::sync::Mutex::new(()),
            poller: Mutex::new(None),
            logger: PlayerLogger::new(),
        }
    }

    /// Resolve every loaded URI through `cache` first
    pub fn with_cache(mut self, cache: Arc<AudioCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_logger(mut self, logger: PlayerLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn logger(&self) -> &PlayerLogger {
        &self.logger
    }

    /// Current snapshot
    pub fn state(&self) -> PlayerState {
        self.shared.snapshot()
    }

    /// Receiver that sees every state change, from commands and poll ticks
    pub fn subscribe(&self) -> watch::Receiver<PlayerState> {
        self.shared.state.subscribe()
    }

    pub fn is_polling(&self) -> bool {
        match self.poller.lock() {
            Ok(slot) => slot.as_ref().map(|h| !h.is_finished()).unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Swap in `uri` (resolved through the cache when one is attached) and
    /// wait, within the configured attempt budget, for its duration.
    pub async fn load_audio(&self, uri: &str) -> LoadOutcome {
        if uri.is_empty() {
            debug!("Ignoring load of an empty URI");
            return LoadOutcome::Ignored;
        }

        let _guard = self.commands.lock().await;
        if self.shared.snapshot().current_uri() == Some(uri) {
            return LoadOutcome::AlreadyLoaded;
        }

        let timer = OperationTimer::new(format!("load {}", uri));
        let primitive = &self.shared.primitive;

        if let Err(e) = primitive.pause() {
            self.logger.log_primitive_error("pause before load", &e);
        }
        self.shared.update(|state| {
            state.phase = PlayerPhase::Loading(uri.to_string());
            state.apply_timing(0.0, f64::NAN);
        });
        // Re-armed for the new URI; ticks are skipped until loading ends
        self.start_polling();

        let source = match &self.cache {
            Some(cache) => cache.get_audio_uri(uri).await,
            None => uri.to_string(),
        };

        if let Err(e) = primitive.replace(&source) {
            self.logger.log_primitive_error("replace", &e);
            self.stop_polling();
            self.shared.update(|state| state.clear_track());
            return LoadOutcome::Failed;
        }

        let duration = self.wait_for_duration().await;
        let outcome = match duration {
            Some(_) => LoadOutcome::Loaded,
            None => {
                self.logger.log_load_timed_out(uri, self.config.duration_poll_attempts);
                LoadOutcome::LoadedUnknownDuration
            }
        };

        if let Err(e) = primitive.set_volume(self.config.default_volume) {
            self.logger.log_primitive_error("set_volume", &e);
        }
        if let Err(e) = primitive.seek_to(0.0) {
            self.logger.log_primitive_error("seek_to", &e);
        }

        let duration = duration.unwrap_or(f64::NAN);
        self.shared.update(|state| {
            state.phase = PlayerPhase::Idle(uri.to_string());
            state.is_muted = false;
            state.previous_volume = None;
            state.apply_timing(0.0, duration);
        });
        self.logger.log_track_loaded(uri, duration, timer.finish());
        outcome
    }

    async fn wait_for_duration(&self) -> Option<f64> {
        for attempt in 0..self.config.duration_poll_attempts {
            let duration = self.shared.primitive.duration();
            if is_known_duration(duration) {
                return Some(duration);
            }
            if attempt + 1 < self.config.duration_poll_attempts {
                sleep(self.config.duration_poll_interval()).await;
            }
        }
        None
    }

    /// Pause and forget the loaded URI. The primitive keeps its last source;
    /// there is no way to release it short of replacing it.
    pub async fn unload_audio(&self) {
        let _guard = self.commands.lock().await;
        self.stop_polling();

        let state = self.shared.snapshot();
        if state.is_playing() {
            if let Err(e) = self.shared.primitive.pause() {
                self.logger.log_primitive_error("pause on unload", &e);
            }
        }
        if let Some(uri) = state.current_uri() {
            debug!("Unloaded {}", uri);
        }
        self.shared.update(|state| state.clear_track());
    }

    pub async fn play(&self) {
        let _guard = self.commands.lock().await;
        let uri = match self.shared.snapshot().phase {
            PlayerPhase::Idle(uri) => uri,
            _ => return,
        };

        match self.shared.primitive.play() {
            Ok(()) => {
                self.logger.log_playback_started(&uri);
                self.shared.update(|state| state.phase = PlayerPhase::Playing(uri));
            }
            Err(e) => {
                self.logger.log_primitive_error("play", &e);
                self.shared.update(|state| state.phase = PlayerPhase::Idle(uri));
            }
        }
    }

    pub async fn pause(&self) {
        let _guard = self.commands.lock().await;
        let Some(uri) = self.settled_uri() else {
            return;
        };

        if let Err(e) = self.shared.primitive.pause() {
            self.logger.log_primitive_error("pause", &e);
        }
        self.logger.log_playback_paused(self.shared.primitive.current_time());
        self.shared.update(|state| state.phase = PlayerPhase::Idle(uri));
    }

    /// Pause and rewind to the start
    pub async fn stop(&self) {
        let _guard = self.commands.lock().await;
        let Some(uri) = self.settled_uri() else {
            return;
        };

        let primitive = &self.shared.primitive;
        if let Err(e) = primitive.pause() {
            self.logger.log_primitive_error("pause", &e);
        }
        if let Err(e) = primitive.seek_to(0.0) {
            self.logger.log_primitive_error("seek_to", &e);
        }
        self.logger.log_playback_stopped("stop requested");

        let duration = primitive.duration();
        self.shared.update(|state| {
            state.phase = PlayerPhase::Idle(uri);
            state.apply_timing(0.0, duration);
        });
    }

    /// Pause when playing, play otherwise
    pub async fn toggle_play_pause(&self) {
        if self.shared.snapshot().is_playing() {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    pub async fn seek_forward(&self, seconds: f64) {
        self.seek_with(|position, _| position + seconds).await;
    }

    pub async fn seek_backward(&self, seconds: f64) {
        self.seek_with(|position, _| position - seconds).await;
    }

    /// Seek to a fraction of the duration
    pub async fn seek_to(&self, progress: f64) {
        self.seek_with(|_, duration| progress.clamp(0.0, 1.0) * duration).await;
    }

    async fn seek_with(&self, target: impl FnOnce(f64, f64) -> f64) {
        let _guard = self.commands.lock().await;
        if self.settled_uri().is_none() {
            return;
        }

        let primitive = &self.shared.primitive;
        let duration = primitive.duration();
        if !is_known_duration(duration) {
            return;
        }

        let position = target(primitive.current_time(), duration);
        let position = if position.is_finite() { position.clamp(0.0, duration) } else { 0.0 };
        if let Err(e) = primitive.seek_to(position) {
            self.logger.log_primitive_error("seek_to", &e);
            return;
        }
        self.shared.update(|state| state.apply_timing(position, duration));
    }

    /// Zero the volume, remembering the pre-mute level. Repeated mutes keep
    /// the level remembered by the first one.
    pub async fn mute(&self) {
        let _guard = self.commands.lock().await;
        if self.settled_uri().is_none() {
            return;
        }

        let primitive = &self.shared.primitive;
        let current = primitive.volume();
        if let Err(e) = primitive.set_volume(0.0) {
            self.logger.log_primitive_error("set_volume", &e);
            return;
        }
        self.shared.update(|state| {
            if state.previous_volume.is_none() {
                state.previous_volume = Some(current);
            }
            state.is_muted = true;
        });
    }

    pub async fn unmute(&self) {
        let _guard = self.commands.lock().await;
        if self.settled_uri().is_none() {
            return;
        }

        let state = self.shared.snapshot();
        if !state.is_muted {
            return;
        }
        let restore = state.previous_volume.unwrap_or(self.config.default_volume);
        if let Err(e) = self.shared.primitive.set_volume(restore) {
            self.logger.log_primitive_error("set_volume", &e);
            return;
        }
        self.shared.update(|state| {
            state.previous_volume = None;
            state.is_muted = false;
        });
    }

    pub async fn toggle_mute(&self) {
        if self.shared.snapshot().is_muted {
            self.unmute().await;
        } else {
            self.mute().await;
        }
    }

    /// Teardown: no poll task left behind, no audio left playing. The
    /// track is forgotten, so later commands are no-ops until the next load.
    pub async fn shutdown(&self) {
        let _guard = self.commands.lock().await;
        self.stop_polling();

        if self.shared.snapshot().is_playing() {
            if let Err(e) = self.shared.primitive.pause() {
                self.logger.log_primitive_error("pause on shutdown", &e);
            }
        }
        self.shared.update(|state| state.clear_track());
    }

    /// URI of an Idle or Playing source
    fn settled_uri(&self) -> Option<String> {
        match self.shared.snapshot().phase {
            PlayerPhase::Idle(uri) | PlayerPhase::Playing(uri) => Some(uri),
            PlayerPhase::Empty | PlayerPhase::Loading(_) => None,
        }
    }

    fn start_polling(&self) {
        let mut slot = match self.poller.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let shared = Arc::clone(&self.shared);
        let period = self.config.poll_interval();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !shared.reconcile() {
                    break;
                }
            }
        }));
    }

    fn stop_polling(&self) {
        let mut slot = match self.poller.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop_polling();
        if self.shared.snapshot().is_playing() {
            if let Err(e) = self.shared.primitive.pause() {
                warn!("Could not pause player on drop: {}", e);
            }
        }
    }
}
