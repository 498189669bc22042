use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::audio::MediaPlayer;
use crate::cache::FileStore;
use crate::error::{AudioError, CacheError};

#[derive(Debug)]
struct MediaState {
    playing: bool,
    position: f64,
    duration: f64,
    volume: f32,
    source: Option<String>,
    next_duration: f64,
    nan_reads_left: usize,
    reject_next: bool,
    fail_commands: bool,
    replaced_while_playing: bool,
    calls: Vec<String>,
}

/// Scriptable playback primitive that records every mutating call
#[derive(Debug)]
pub struct FakeMediaPlayer {
    state: Mutex<MediaState>,
}

impl FakeMediaPlayer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MediaState {
                playing: false,
                position: 0.0,
                duration: f64::NAN,
                volume: 1.0,
                source: None,
                next_duration: 180.0,
                nan_reads_left: 0,
                reject_next: false,
                fail_commands: false,
                replaced_while_playing: false,
                calls: Vec::new(),
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MediaState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Duration reported by sources replaced from now on
    pub fn set_next_duration(&self, seconds: f64) {
        self.with_state(|s| s.next_duration = seconds);
    }

    /// The next `reads` duration reads report NaN
    pub fn delay_duration_reads(&self, reads: usize) {
        self.with_state(|s| s.nan_reads_left = reads);
    }

    pub fn reject_next_source(&self) {
        self.with_state(|s| s.reject_next = true);
    }

    /// Make play/pause/seek/volume commands fail
    pub fn fail_commands(&self, fail: bool) {
        self.with_state(|s| s.fail_commands = fail);
    }

    /// Change the volume without recording a call, as another app would
    pub fn set_volume_level(&self, volume: f32) {
        self.with_state(|s| s.volume = volume);
    }

    /// Flip the playing flag from outside the controller
    pub fn set_playing(&self, playing: bool) {
        self.with_state(|s| s.playing = playing);
    }

    pub fn advance(&self, seconds: f64) {
        self.with_state(|s| s.position += seconds);
    }

    pub fn source(&self) -> Option<String> {
        self.with_state(|s| s.source.clone())
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    /// Whether a source was ever swapped while audio was coming out
    pub fn replaced_while_playing(&self) -> bool {
        self.with_state(|s| s.replaced_while_playing)
    }

    fn command(&self, call: String, f: impl FnOnce(&mut MediaState)) -> Result<(), AudioError> {
        self.with_state(|s| {
            if s.fail_commands {
                return Err(AudioError::CommandFailed(call));
            }
            s.calls.push(call);
            f(s);
            Ok(())
        })
    }
}

impl MediaPlayer for FakeMediaPlayer {
    fn playing(&self) -> bool {
        self.with_state(|s| s.playing)
    }

    fn current_time(&self) -> f64 {
        self.with_state(|s| s.position)
    }

    fn duration(&self) -> f64 {
        self.with_state(|s| {
            if s.nan_reads_left > 0 {
                s.nan_reads_left -= 1;
                return f64::NAN;
            }
            s.duration
        })
    }

    fn volume(&self) -> f32 {
        self.with_state(|s| s.volume)
    }

    fn set_volume(&self, volume: f32) -> Result<(), AudioError> {
        self.command(format!("volume:{}", volume), |s| s.volume = volume)
    }

    fn play(&self) -> Result<(), AudioError> {
        self.command("play".to_string(), |s| s.playing = true)
    }

    fn pause(&self) -> Result<(), AudioError> {
        self.command("pause".to_string(), |s| s.playing = false)
    }

    fn replace(&self, source: &str) -> Result<(), AudioError> {
        self.with_state(|s| {
            if s.reject_next {
                s.reject_next = false;
                return Err(AudioError::SourceRejected {
                    source_uri: source.to_string(),
                    reason: "unsupported format".to_string(),
                });
            }
            if s.playing {
                s.replaced_while_playing = true;
            }
            s.calls.push(format!("replace:{}", source));
            s.source = Some(source.to_string());
            s.position = 0.0;
            s.duration = s.next_duration;
            Ok(())
        })
    }

    fn seek_to(&self, seconds: f64) -> Result<(), AudioError> {
        self.command(format!("seek:{}", seconds), |s| s.position = seconds)
    }
}

#[derive(Debug, Clone, Copy)]
enum DownloadFailure {
    Status(u16),
    Transport,
}

/// File system kept in memory; downloads always produce `BODY`
#[derive(Debug, Default)]
pub struct FakeFileStore {
    files: Mutex<HashMap<PathBuf, usize>>,
    failure: Mutex<Option<DownloadFailure>>,
    delay: Mutex<Option<Duration>>,
    downloads: AtomicUsize,
    mkdirs: AtomicUsize,
}

impl FakeFileStore {
    pub const BODY: &'static [u8] = b"ID3fake-audio-payload";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn mkdir_count(&self) -> usize {
        self.mkdirs.load(Ordering::SeqCst)
    }

    /// Remove a file behind the cache's back
    pub fn delete(&self, path: &Path) {
        self.files.lock().unwrap().remove(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn fail_with_status(&self, status: u16) {
        *self.failure.lock().unwrap() = Some(DownloadFailure::Status(status));
    }

    pub fn fail_with_transport_error(&self) {
        *self.failure.lock().unwrap() = Some(DownloadFailure::Transport);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Make every download take `delay` of (tokio) time
    pub fn set_download_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl FileStore for FakeFileStore {
    async fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<(), CacheError> {
        self.mkdirs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<u16, CacheError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = *self.failure.lock().unwrap();
        match failure {
            Some(DownloadFailure::Status(status)) => Ok(status),
            Some(DownloadFailure::Transport) => Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))),
            None => {
                self.files
                    .lock()
                    .unwrap()
                    .insert(dest.to_path_buf(), Self::BODY.len());
                Ok(200)
            }
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<(), CacheError> {
        self.delete(path);
        Ok(())
    }

    async fn file_size(&self, path: &Path) -> Option<u64> {
        self.files.lock().unwrap().get(path).map(|len| *len as u64)
    }
}
