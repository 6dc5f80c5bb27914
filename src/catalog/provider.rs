use std::io::Read;

use crate::error::CatalogError;

use super::model::{Artist, Playlist, PlaylistEntry, ProviderKind, Track};

/// Encoded audio bytes for one track. Dropping the stream closes it.
pub type TrackStream = Box<dyn Read + Send>;

/// A music catalog the player can pull streams from.
///
/// Only [`Provider::get_stream`] is used during playback; the listing calls
/// serve library synchronisation.
pub trait Provider: Send + Sync {
    /// Open the encoded stream for `track_id`.
    fn get_stream(&self, track_id: &str) -> Result<TrackStream, CatalogError>;

    fn get_track_info(&self, track_id: &str) -> Result<Track, CatalogError>;

    fn list_tracks(&self) -> Result<Vec<Track>, CatalogError>;

    fn list_playlists(&self) -> Result<Vec<Playlist>, CatalogError>;

    fn list_playlist_entries(&self) -> Result<Vec<PlaylistEntry>, CatalogError>;

    /// Whole library grouped by artist and album.
    fn fetch_library(&self) -> Result<Vec<Artist>, CatalogError>;

    fn kind(&self) -> ProviderKind;
}
