use std::time::Duration;

/// Catalog metadata for one track. Owned by the provider; the player only
/// holds shared references to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    /// Unique id used to request the track's stream.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub disc_number: u8,
    pub track_number: u32,
    pub duration: Duration,
    /// Size of the encoded stream in bytes, when known.
    pub size: u64,
    pub play_count: u32,
    pub year: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub year: u32,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub albums: Vec<Album>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub playlist_id: String,
    pub track_id: String,
}

/// Which backend a provider talks to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// Audio files in a local directory.
    Local,
    /// A Subsonic-compatible server.
    Subsonic,
}
