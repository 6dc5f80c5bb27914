//! Catalog side of the player: track metadata, the provider interface, and a
//! provider over a local directory.

mod display;
mod local;
mod model;
mod provider;

pub use display::display_from_fields;
pub use local::LocalCatalog;
pub use model::*;
pub use provider::{Provider, TrackStream};
