//! The control loop: the only place player state changes.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select, tick};
use tracing::{debug, trace};

use crate::catalog::{Provider, Track, TrackStream};
use crate::error::PlayerError;
use crate::stream::StreamHandler;
use crate::sync::{lock, read, write};

use super::Shared;
use super::buffer::PrefetchBuffer;
use super::types::{Callback, CallbackData, PlaybackState, PlayerCmd};

/// Playback clock for the current track. Paused time is excluded.
#[derive(Debug, Default)]
struct Clock {
    started_at: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl Clock {
    fn start(&mut self, paused: bool) {
        let now = Instant::now();
        self.started_at = Some(now);
        self.paused_at = paused.then_some(now);
        self.paused_total = Duration::ZERO;
    }

    fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            self.paused_total += at.elapsed();
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn elapsed(&self) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let until = self.paused_at.unwrap_or_else(Instant::now);
        until
            .saturating_duration_since(start)
            .saturating_sub(self.paused_total)
    }
}

pub(super) struct ControlLoop {
    shared: Arc<Shared>,
    provider: Arc<dyn Provider>,
    handler: Arc<dyn StreamHandler>,
    callback: Option<Callback>,
    errors: Sender<PlayerError>,
    buffering_wait: Duration,
    finished: Receiver<()>,
    clock: Clock,
}

impl ControlLoop {
    pub(super) fn new(
        shared: Arc<Shared>,
        provider: Arc<dyn Provider>,
        handler: Arc<dyn StreamHandler>,
        callback: Option<Callback>,
        errors: Sender<PlayerError>,
        buffering_wait: Duration,
    ) -> Self {
        let finished = handler.finished();
        Self {
            shared,
            provider,
            handler,
            callback,
            errors,
            buffering_wait,
            finished,
            clock: Clock::default(),
        }
    }

    pub(super) fn run(mut self, cmds: Receiver<PlayerCmd>, interval: Duration) {
        let finished = self.finished.clone();
        let handler_errors = self.handler.errors();
        let ticker = tick(interval);

        loop {
            select! {
                recv(cmds) -> cmd => match cmd {
                    Ok(PlayerCmd::Close) | Err(_) => break,
                    Ok(cmd) => self.handle(cmd),
                },
                recv(finished) -> signal => {
                    if signal.is_ok() {
                        self.on_finished();
                    }
                },
                recv(handler_errors) -> err => {
                    if let Ok(err) = err {
                        self.report(PlayerError::Handler(err));
                    }
                },
                recv(ticker) -> _ => self.on_tick(),
            }
        }
        debug!("player control loop closed");
    }

    fn handle(&mut self, cmd: PlayerCmd) {
        match cmd {
            PlayerCmd::Play => self.play(),
            PlayerCmd::Pause => self.pause(),
            PlayerCmd::PlayPause => match self.state() {
                PlaybackState::Playing => self.pause(),
                PlaybackState::Paused | PlaybackState::Stopped => self.play(),
            },
            PlayerCmd::Stop => self.stop(),
            PlayerCmd::Next => self.next(),
            PlayerCmd::Previous => self.previous(),
            PlayerCmd::SetQueue(tracks) => {
                debug!(tracks = tracks.len(), "play queue replaced");
                self.shared.queue.replace(tracks);
            }
            PlayerCmd::UpdateProvider(provider) => {
                self.stop();
                debug!(kind = ?provider.kind(), "provider updated");
                self.provider = provider;
            }
            // Handled by `run`.
            PlayerCmd::Close => {}
            #[cfg(test)]
            PlayerCmd::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn state(&self) -> PlaybackState {
        *read(&self.shared.state)
    }

    fn set_state(&self, state: PlaybackState) {
        let mut current = write(&self.shared.state);
        if *current != state {
            debug!(from = ?*current, to = ?state, "playback state");
            *current = state;
        }
    }

    fn set_current(&self, track: Option<Arc<Track>>) {
        *write(&self.shared.current) = track;
    }

    fn take_current(&self) -> Option<Arc<Track>> {
        write(&self.shared.current).take()
    }

    fn report(&self, err: PlayerError) {
        debug!(error = %err, "player error");
        let _ = self.errors.send(err);
    }

    fn play(&mut self) {
        match self.state() {
            PlaybackState::Playing => {}
            PlaybackState::Paused => {
                self.handler.resume();
                self.clock.resume();
                self.set_state(PlaybackState::Playing);
            }
            PlaybackState::Stopped => match self.shared.queue.pop() {
                Some(track) => {
                    self.set_state(PlaybackState::Playing);
                    self.start(track);
                }
                None => self.report(PlayerError::NoNextTrack),
            },
        }
    }

    fn pause(&mut self) {
        if self.state() == PlaybackState::Playing {
            self.handler.pause();
            self.clock.pause();
            self.set_state(PlaybackState::Paused);
        }
    }

    fn stop(&mut self) {
        if self.state() == PlaybackState::Stopped {
            return;
        }
        if let Some(track) = self.take_current() {
            self.shared.queue.push(track);
        }
        self.handler.stop();
        self.clock.clear();
        self.set_state(PlaybackState::Stopped);
    }

    fn next(&mut self) {
        if self.state() == PlaybackState::Stopped {
            return;
        }
        if self.shared.queue.is_empty() {
            self.report(PlayerError::NoNextTrack);
            return;
        }
        self.set_state(PlaybackState::Playing);
        if let Some(track) = self.take_current() {
            self.shared.history.push(track);
        }
        if let Some(track) = self.shared.queue.pop() {
            self.start(track);
        }
    }

    fn previous(&mut self) {
        if self.state() == PlaybackState::Stopped {
            return;
        }
        if self.shared.history.is_empty() {
            trace!("no history to go back to");
            return;
        }
        self.set_state(PlaybackState::Playing);
        if let Some(track) = self.take_current() {
            self.shared.queue.push(track);
        }
        if let Some(track) = self.shared.history.pop() {
            self.start(track);
        }
    }

    fn on_finished(&mut self) {
        if self.state() == PlaybackState::Stopped {
            trace!("finished signal while stopped, ignored");
            return;
        }
        if let Some(track) = self.take_current() {
            self.shared.history.push(track);
        }
        match self.shared.queue.pop() {
            Some(track) => self.start(track),
            None => {
                debug!("play queue exhausted");
                self.handler.stop();
                self.clock.clear();
                self.set_state(PlaybackState::Stopped);
            }
        }
    }

    fn on_tick(&self) {
        if self.state() == PlaybackState::Stopped {
            return;
        }
        let (Some(callback), Some(track)) = (&self.callback, read(&self.shared.current).clone())
        else {
            return;
        };
        callback(&CallbackData {
            track,
            duration: self.clock.elapsed(),
        });
    }

    /// Start `track` from scratch. The caller has already set the state the
    /// track should play in; on failure the player ends up `Stopped` with
    /// the track back at the head of the queue.
    fn start(&mut self, track: Arc<Track>) {
        debug!(track = %track.id, "starting track");
        self.set_current(Some(Arc::clone(&track)));

        let stream = match self.provider.get_stream(&track.id) {
            Ok(stream) => stream,
            Err(source) => {
                let track_id = track.id.clone();
                self.abort_start(track, PlayerError::Stream { track_id, source });
                return;
            }
        };

        let buffer = self.swap_buffer();
        spawn_copy(stream, Arc::clone(&buffer), track.id.clone(), self.errors.clone());
        thread::sleep(self.buffering_wait);

        // Anything signalled so far belongs to the previous stream.
        while self.finished.try_recv().is_ok() {}

        if let Err(e) = self.handler.play(Box::new(buffer.reader())) {
            self.abort_start(track, e.into());
            return;
        }
        let paused = self.state() == PlaybackState::Paused;
        self.clock.start(paused);
    }

    fn abort_start(&mut self, track: Arc<Track>, err: PlayerError) {
        self.handler.stop();
        self.set_current(None);
        self.shared.queue.push(track);
        self.clock.clear();
        self.set_state(PlaybackState::Stopped);
        self.report(err);
    }

    /// Reuse the buffer if its copy is done, otherwise retire it and let the
    /// running copy finish into a buffer nobody reads.
    fn swap_buffer(&self) -> Arc<PrefetchBuffer> {
        let mut slot = lock(&self.shared.buffer);
        if !slot.is_filled() {
            trace!("prefetch copy still running, allocating a new buffer");
            slot.retire();
            *slot = Arc::new(PrefetchBuffer::new());
        }
        slot.reset();
        Arc::clone(&slot)
    }
}

fn spawn_copy(
    mut stream: TrackStream,
    buffer: Arc<PrefetchBuffer>,
    track_id: String,
    errors: Sender<PlayerError>,
) {
    thread::spawn(move || {
        let mut writer = buffer.writer();
        match io::copy(&mut stream, &mut writer) {
            Ok(bytes) => {
                trace!(track = %track_id, bytes, "track fully buffered");
                drop(stream);
                buffer.set_filled(true);
            }
            Err(source) => {
                debug!(track = %track_id, error = %source, "buffering failed");
                let _ = errors.send(PlayerError::Copy { track_id, source });
            }
        }
    });
}
