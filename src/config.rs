//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema used to tune the playback
//! engine and helpers to load configuration from disk.

mod load;
mod schema;

pub use load::{default_config_path, resolve_config_path};
pub use schema::*;

/// Load settings, falling back to defaults when the file is unreadable or invalid.
///
/// Logging is not initialized yet when this runs, so problems go to stderr.
pub fn load_or_default() -> Settings {
    match Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("tunestream: invalid config, using defaults: {msg}");
                Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent the player from starting.
            eprintln!("tunestream: failed to load config, using defaults: {e}");
            Settings::default()
        }
    }
}
