//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Build the filter: `RUST_LOG` wins over the configured level.
fn env_filter(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
}

/// Install the global subscriber, writing to the configured file or stderr.
///
/// Calling this twice is harmless; the second subscriber is ignored.
pub fn init(settings: &LoggingSettings) -> io::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(settings))
        .with_target(true);

    let result = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };

    if let Err(e) = result {
        tracing::debug!("tracing subscriber already installed: {e}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_with_file_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.log");
        let settings = LoggingSettings {
            level: "debug".to_string(),
            file: Some(path.clone()),
        };

        init(&settings).unwrap();
        assert!(path.exists());
        // A second install must not fail.
        init(&settings).unwrap();
    }

    #[test]
    fn init_fails_when_log_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            level: "info".to_string(),
            file: Some(dir.path().join("missing").join("player.log")),
        };
        assert!(init(&settings).is_err());
    }
}
