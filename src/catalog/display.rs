use crate::config::TrackDisplayField;

use super::model::Track;

/// Build a display string for a track according to the provided `fields` and separator.
///
/// Empty metadata fields are skipped; falls back to the track id when no
/// parts were produced.
pub fn display_from_fields(track: &Track, fields: &[TrackDisplayField], sep: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for f in fields {
        let value = match f {
            TrackDisplayField::Title => track.title.trim(),
            TrackDisplayField::Artist => track.artist.trim(),
            TrackDisplayField::Album => track.album.trim(),
            TrackDisplayField::AlbumArtist => track.album_artist.trim(),
            TrackDisplayField::Id => track.id.as_str(),
        };
        if !value.is_empty() {
            parts.push(value);
        }
    }

    if parts.is_empty() {
        track.id.clone()
    } else {
        parts.join(sep)
    }
}
