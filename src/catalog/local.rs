use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lofty::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::CatalogError;

use super::display::display_from_fields;
use super::model::{Album, Artist, Playlist, PlaylistEntry, ProviderKind, Track};
use super::provider::{Provider, TrackStream};

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_ALBUM: &str = "Unknown Album";

/// A catalog backed by audio files under one directory.
///
/// Track ids are the file paths relative to the root, with `/` separators.
pub struct LocalCatalog {
    root: PathBuf,
    tracks: Vec<Track>,
}

impl LocalCatalog {
    /// Scan `root` for audio files and read their tags.
    pub fn scan(root: &Path, settings: &LibrarySettings) -> Self {
        let tracks = scan(root, settings);
        debug!(root = %root.display(), count = tracks.len(), "scanned local catalog");
        Self {
            root: root.to_path_buf(),
            tracks,
        }
    }

    /// Tracks in display order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn find(&self, track_id: &str) -> Result<&Track, CatalogError> {
        self.tracks
            .iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| CatalogError::NotFound(track_id.to_string()))
    }
}

impl Provider for LocalCatalog {
    fn get_stream(&self, track_id: &str) -> Result<TrackStream, CatalogError> {
        // Only ids produced by the scan resolve, so no path escapes the root.
        let track = self.find(track_id)?;
        let file = File::open(self.root.join(&track.id))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn get_track_info(&self, track_id: &str) -> Result<Track, CatalogError> {
        self.find(track_id).cloned()
    }

    fn list_tracks(&self) -> Result<Vec<Track>, CatalogError> {
        Ok(self.tracks.clone())
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>, CatalogError> {
        Err(CatalogError::Unsupported("list_playlists"))
    }

    fn list_playlist_entries(&self) -> Result<Vec<PlaylistEntry>, CatalogError> {
        Err(CatalogError::Unsupported("list_playlist_entries"))
    }

    fn fetch_library(&self) -> Result<Vec<Artist>, CatalogError> {
        Ok(group_library(&self.tracks))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }
}

/// Group tracks into artists and albums, both sorted by name, tracks by
/// disc and track number.
fn group_library(tracks: &[Track]) -> Vec<Artist> {
    let mut by_artist: BTreeMap<&str, BTreeMap<&str, Vec<Track>>> = BTreeMap::new();
    for t in tracks {
        let artist = if t.album_artist.is_empty() {
            t.artist.as_str()
        } else {
            t.album_artist.as_str()
        };
        let artist = if artist.is_empty() { UNKNOWN_ARTIST } else { artist };
        let album = if t.album.is_empty() { UNKNOWN_ALBUM } else { t.album.as_str() };
        by_artist
            .entry(artist)
            .or_default()
            .entry(album)
            .or_default()
            .push(t.clone());
    }

    by_artist
        .into_iter()
        .map(|(artist, albums)| Artist {
            id: artist.to_string(),
            name: artist.to_string(),
            albums: albums
                .into_iter()
                .map(|(album, mut tracks)| {
                    tracks.sort_by_key(|t| (t.disc_number, t.track_number));
                    Album {
                        id: format!("{artist}/{album}"),
                        name: album.to_string(),
                        artist: artist.to_string(),
                        year: tracks.iter().map(|t| t.year).max().unwrap_or(0),
                        tracks,
                    }
                })
                .collect(),
        })
        .collect()
}

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let exts: Vec<String> = settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn track_id(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_track(root: &Path, path: &Path) -> Track {
    let mut track = Track {
        id: track_id(root, path),
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
        size: path.metadata().map(|m| m.len()).unwrap_or(0),
        ..Track::default()
    };

    if let Ok(tagged) = lofty::read_from_path(path) {
        track.duration = tagged.properties().duration();

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            if let Some(v) = tag.title().filter(|v| !v.trim().is_empty()) {
                track.title = v.trim().to_string();
            }
            if let Some(v) = tag.artist() {
                track.artist = v.trim().to_string();
            }
            if let Some(v) = tag.album() {
                track.album = v.trim().to_string();
            }
            track.track_number = tag.track().unwrap_or(0);
            track.disc_number = tag.disk().map(|d| d.min(u32::from(u8::MAX)) as u8).unwrap_or(0);
        }
    }

    track
}

pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut tracks: Vec<(String, Track)> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|entry| {
            let path = entry.path();
            path.is_file() && is_audio_file(path, settings)
        })
        .map(|entry| {
            let track = read_track(dir, entry.path());
            let key = display_from_fields(
                &track,
                &settings.display_fields,
                &settings.display_separator,
            )
            .to_lowercase();
            (key, track)
        })
        .collect();

    tracks.sort_by(|a, b| a.0.cmp(&b.0));
    tracks.into_iter().map(|(_, t)| t).collect()
}
