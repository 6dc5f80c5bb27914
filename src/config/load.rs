use std::{env, path::PathBuf};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `TUNESTREAM__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("TUNESTREAM")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.playback.max_read_retry_attempts == 0 {
            return Err("playback.max_read_retry_attempts must be >= 1".to_string());
        }
        if self.playback.callback_interval_ms == 0 {
            return Err("playback.callback_interval_ms must be >= 1".to_string());
        }
        if self.stream.chunk_size == 0 || self.stream.chunk_size % 2 != 0 {
            return Err("stream.chunk_size must be a positive even number".to_string());
        }
        if self.stream.max_queued_chunks == 0 {
            return Err("stream.max_queued_chunks must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `TUNESTREAM_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("TUNESTREAM_CONFIG_PATH") {
        return Some(PathBuf::from(p));
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/tunestream/config.toml`
/// or `~/.config/tunestream/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("tunestream").join("config.toml"))
}
