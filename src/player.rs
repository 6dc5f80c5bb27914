//! Playback controller.
//!
//! [`Player`] is a thin handle: every command is queued to a control thread
//! that drives the stream handler and is the only writer of player state.
//! Reads (`state`, `current_track`, ...) take the state locks directly.

mod buffer;
mod control;
mod queue;
mod types;

use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::catalog::{Provider, Track};
use crate::config::PlaybackSettings;
use crate::error::PlayerError;
use crate::stream::StreamHandler;
use crate::sync::{lock, read};

pub use buffer::{PrefetchBuffer, PrefetchReader, PrefetchWriter};
pub use queue::PlayQueue;
pub use types::{Callback, CallbackData, PlaybackState};

use control::ControlLoop;
use types::PlayerCmd;

const DEFAULT_CALLBACK_INTERVAL: Duration = Duration::from_millis(1000);

/// State shared between the handle and the control thread.
struct Shared {
    state: RwLock<PlaybackState>,
    current: RwLock<Option<Arc<Track>>>,
    queue: PlayQueue,
    history: PlayQueue,
    buffer: Mutex<Arc<PrefetchBuffer>>,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            state: RwLock::new(PlaybackState::Stopped),
            current: RwLock::new(None),
            queue: PlayQueue::new(),
            history: PlayQueue::new(),
            buffer: Mutex::new(Arc::new(PrefetchBuffer::new())),
        }
    }
}

pub struct Player {
    shared: Arc<Shared>,
    /// Shared with the control loop so closing the loop leaves a running
    /// session alone. The session ends when the last owner drops it.
    handler: Arc<dyn StreamHandler>,
    tx: Sender<PlayerCmd>,
    errors: Receiver<PlayerError>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    /// Spawn the control thread. `callback`, if any, is invoked every
    /// `settings.callback_interval_ms` while a track is loaded.
    pub fn new(
        provider: Arc<dyn Provider>,
        handler: impl StreamHandler + 'static,
        callback: Option<Callback>,
        settings: &PlaybackSettings,
    ) -> Self {
        let (tx, rx) = unbounded::<PlayerCmd>();
        let (errors_tx, errors_rx) = unbounded();
        let shared = Arc::new(Shared::default());
        let handler: Arc<dyn StreamHandler> = Arc::new(handler);

        let mut interval = settings.callback_interval();
        if interval.is_zero() {
            interval = DEFAULT_CALLBACK_INTERVAL;
        }
        let control = ControlLoop::new(
            Arc::clone(&shared),
            provider,
            Arc::clone(&handler),
            callback,
            errors_tx,
            settings.buffering_wait(),
        );
        let join = thread::spawn(move || control.run(rx, interval));
        debug!(?interval, "player started");

        Self {
            shared,
            handler,
            tx,
            errors: errors_rx,
            join: Mutex::new(Some(join)),
        }
    }

    fn send(&self, cmd: PlayerCmd) {
        // Fails only after `close`, when commands are ignored anyway.
        let _ = self.tx.send(cmd);
    }

    /// Resume if paused, otherwise start the head of the queue.
    pub fn play(&self) {
        self.send(PlayerCmd::Play);
    }

    pub fn pause(&self) {
        self.send(PlayerCmd::Pause);
    }

    pub fn play_pause(&self) {
        self.send(PlayerCmd::PlayPause);
    }

    /// Stop playback. The current track goes back to the head of the queue.
    pub fn stop(&self) {
        self.send(PlayerCmd::Stop);
    }

    pub fn next(&self) {
        self.send(PlayerCmd::Next);
    }

    pub fn previous(&self) {
        self.send(PlayerCmd::Previous);
    }

    /// Replace the upcoming queue. History and the current track are kept.
    pub fn create_play_queue(&self, tracks: Vec<Arc<Track>>) {
        self.send(PlayerCmd::SetQueue(tracks));
    }

    pub fn create_shuffled_play_queue(&self, mut tracks: Vec<Arc<Track>>) {
        tracks.shuffle(&mut rand::rng());
        self.send(PlayerCmd::SetQueue(tracks));
    }

    /// Stop playback and take future streams from `provider`.
    pub fn update_provider(&self, provider: Arc<dyn Provider>) {
        self.send(PlayerCmd::UpdateProvider(provider));
    }

    /// Shut the control loop down and wait for it. A playing stream is not
    /// stopped; call [`Player::stop`] first for that. Dropping the `Player`
    /// releases the handler, which ends any session it still runs.
    pub fn close(&self) {
        self.send(PlayerCmd::Close);
        if let Some(handle) = lock(&self.join).take() {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> PlaybackState {
        *read(&self.shared.state)
    }

    pub fn current_track(&self) -> Option<Arc<Track>> {
        read(&self.shared.current).clone()
    }

    /// Head of the upcoming queue.
    pub fn next_track(&self) -> Option<Arc<Track>> {
        self.shared.queue.peek()
    }

    /// Most recently played track.
    pub fn history_head(&self) -> Option<Arc<Track>> {
        self.shared.history.peek()
    }

    pub fn queue(&self) -> Vec<Arc<Track>> {
        self.shared.queue.snapshot()
    }

    pub fn history(&self) -> Vec<Arc<Track>> {
        self.shared.history.snapshot()
    }

    /// Errors from every stage of playback. Unread errors never block the
    /// player.
    pub fn errors(&self) -> Receiver<PlayerError> {
        self.errors.clone()
    }

    /// The stream handler driven by this player.
    pub fn handler(&self) -> &dyn StreamHandler {
        self.handler.as_ref()
    }

    #[cfg(test)]
    fn buffer(&self) -> Arc<PrefetchBuffer> {
        Arc::clone(&lock(&self.shared.buffer))
    }

    /// Block until the control loop has handled every command sent so far.
    #[cfg(test)]
    fn sync(&self) {
        let (ack, done) = crossbeam_channel::bounded(1);
        self.send(PlayerCmd::Barrier(ack));
        let _ = done.recv_timeout(Duration::from_secs(5));
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.close();
    }
}
