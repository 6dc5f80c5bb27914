use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/tunestream/config.toml` or `~/.config/tunestream/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `TUNESTREAM__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub playback: PlaybackSettings,
    pub stream: StreamSettings,
    pub library: LibrarySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Delay before a freshly buffered track is handed to the decoder (milliseconds).
    /// Also the initial backoff of the first-read retry.
    pub buffering_wait_ms: u64,
    /// How many times the first read of a stream is attempted before giving up.
    pub max_read_retry_attempts: u32,
    /// Interval between status callbacks (milliseconds).
    pub callback_interval_ms: u64,
    /// Whether the initial play queue is shuffled.
    pub shuffle: bool,
}

impl PlaybackSettings {
    pub fn buffering_wait(&self) -> Duration {
        Duration::from_millis(self.buffering_wait_ms)
    }

    pub fn callback_interval(&self) -> Duration {
        Duration::from_millis(self.callback_interval_ms)
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            buffering_wait_ms: 200,
            max_read_retry_attempts: 5,
            callback_interval_ms: 1000,
            shuffle: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Size in bytes of each decoded chunk moved from decoder to device.
    pub chunk_size: usize,
    /// Chunks the output device may hold before writes block.
    pub max_queued_chunks: usize,
    /// Consecutive read failures after which a playback session is abandoned.
    pub max_consecutive_read_errors: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            max_queued_chunks: 4,
            max_consecutive_read_errors: 8,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackDisplayField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    /// Track id as known to the provider.
    Id,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,

    /// Which fields make up a track's display line and ordering.
    ///
    /// Example: ["artist", "title"] -> "Artist - Title"
    pub display_fields: Vec<TrackDisplayField>,
    /// Separator used to join `display_fields`.
    pub display_separator: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into()],
            follow_links: true,
            include_hidden: true,
            recursive: true,
            max_depth: None,
            display_fields: vec![TrackDisplayField::Artist, TrackDisplayField::Title],
            display_separator: " - ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
