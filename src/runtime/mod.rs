use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use tunestream::catalog::LocalCatalog;
use tunestream::config;
use tunestream::logging;
use tunestream::player::Player;
use tunestream::stream::HandlerSettings;
use tunestream::stream::NativeStreamHandler;
use tunestream::stream::backend::{RodioDecoder, RodioOutput};

mod commands;
mod status;

use commands::ControlCmd;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load_or_default();
    logging::init(&settings.logging)?;

    let dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let catalog = Arc::new(LocalCatalog::scan(&dir, &settings.library));
    let tracks: Vec<_> = catalog.tracks().iter().cloned().map(Arc::new).collect();
    info!(dir = %dir.display(), tracks = tracks.len(), "library scanned");

    let handler = NativeStreamHandler::new(
        RodioDecoder,
        RodioOutput::new(&settings.stream),
        HandlerSettings::new(&settings.playback, &settings.stream),
    );
    let callback = status::printer(
        settings.library.display_fields.clone(),
        settings.library.display_separator.clone(),
    );
    let player = Player::new(catalog, handler, Some(callback), &settings.playback);

    if settings.playback.shuffle {
        player.create_shuffled_play_queue(tracks);
    } else {
        player.create_play_queue(tracks);
    }

    let errors = player.errors();
    thread::spawn(move || {
        for err in errors.iter() {
            warn!(error = %err, "playback error");
        }
    });

    println!("{}", commands::HELP);
    for line in io::stdin().lock().lines() {
        let line = line?;
        match ControlCmd::parse(&line) {
            Some(ControlCmd::Quit) => break,
            Some(cmd) => cmd.apply(&player),
            None if line.trim().is_empty() => {}
            None => println!("{}", commands::HELP),
        }
    }

    player.stop();
    player.close();
    Ok(())
}
