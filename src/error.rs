//! Error types shared by the catalog, stream handler and player.

use std::io;

use thiserror::Error;

/// Errors returned by a catalog [`Provider`](crate::catalog::Provider).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No track with this id is known to the provider.
    #[error("track not found: {0}")]
    NotFound(String),

    /// The provider does not implement this listing.
    #[error("operation not supported by provider: {0}")]
    Unsupported(&'static str),

    #[error("catalog I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors produced while decoding a stream or driving the output device.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The stream header could not be decoded.
    #[error("failed to decode stream: {0}")]
    Decode(String),

    /// The output device could not be opened or closed.
    #[error("output device error: {0}")]
    Device(String),

    #[error("failed to read decoded audio: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write to output device: {0}")]
    Write(#[source] io::Error),
}

/// Errors surfaced on the player's error channel.
#[derive(Debug, Error)]
pub enum PlayerError {
    /// Asked to advance but the upcoming queue is empty.
    #[error("no track in playing queue")]
    NoNextTrack,

    /// The provider could not hand out a stream for the track.
    #[error("failed to get stream for track {track_id}: {source}")]
    Stream {
        track_id: String,
        #[source]
        source: CatalogError,
    },

    /// Copying the network stream into the prefetch buffer failed.
    #[error("failed to buffer track {track_id}: {source}")]
    Copy {
        track_id: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Result type for handler operations.
pub type Result<T> = std::result::Result<T, HandlerError>;
