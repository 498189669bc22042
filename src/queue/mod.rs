use crate::error::PlaylistError;

pub mod sequencer;

pub use sequencer::PlaylistSequencer;

/// Ordered track URLs plus the selection bookkeeping of a sequencer.
///
/// `generation` increases on every selection and on every list swap, so a
/// load that finishes late can tell whether it is still the current one.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    audio_urls: Vec<String>,
    selected_index: Option<usize>,
    pending_auto_play: bool,
    generation: u64,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap the whole list. Clears the selection and any armed auto-play.
    pub fn replace(&mut self, urls: Vec<String>) {
        self.audio_urls = urls;
        self.selected_index = None;
        self.pending_auto_play = false;
        self.generation += 1;
    }

    pub fn urls(&self) -> &[String] {
        &self.audio_urls
    }

    pub fn len(&self) -> usize {
        self.audio_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio_urls.is_empty()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_auto_play_pending(&self) -> bool {
        self.pending_auto_play
    }

    pub fn url_at(&self, index: usize) -> Result<&str, PlaylistError> {
        if self.audio_urls.is_empty() {
            return Err(PlaylistError::EmptyPlaylist);
        }
        self.audio_urls
            .get(index)
            .map(String::as_str)
            .ok_or(PlaylistError::InvalidIndex {
                index,
                len: self.audio_urls.len(),
            })
    }

    pub fn current_url(&self) -> Option<&str> {
        self.selected_index
            .and_then(|index| self.audio_urls.get(index))
            .map(String::as_str)
    }

    /// Move the selection to `index`, returning the new generation
    pub fn select(&mut self, index: usize, arm_auto_play: bool) -> Result<u64, PlaylistError> {
        self.url_at(index)?;
        self.selected_index = Some(index);
        self.pending_auto_play = arm_auto_play;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Consume the auto-play latch for the selection made at `generation`.
    ///
    /// Returns whether it was armed. A stale generation leaves the latch to
    /// the newer selection.
    pub fn take_auto_play(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        std::mem::take(&mut self.pending_auto_play)
    }

    pub fn disarm(&mut self) {
        self.pending_auto_play = false;
    }

    /// Index after the selection, clamped to the last track
    pub fn next_index(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(match self.selected_index {
            Some(index) => (index + 1).min(self.len() - 1),
            None => 0,
        })
    }

    /// Index before the selection, clamped to the first track
    pub fn previous_index(&self) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        Some(self.selected_index.map(|index| index.saturating_sub(1)).unwrap_or(0))
    }
}

/// Track locations listed in M3U content. Comment and directive lines are skipped.
pub fn parse_m3u(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
