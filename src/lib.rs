//! Streaming playback engine.
//!
//! A [`player::Player`] turns a queue of catalog tracks into continuous audio
//! while each track is still being downloaded. Catalog access, decoding and
//! audio output are pluggable through the traits in [`catalog`] and
//! [`stream`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod player;
pub mod stream;
mod sync;

pub use catalog::{Provider, Track};
pub use error::{CatalogError, HandlerError, PlayerError};
pub use player::{CallbackData, PlaybackState, Player};
pub use stream::{NativeStreamHandler, StreamHandler};
