//! The stream handler: owns at most one playback session at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use tracing::{debug, warn};

use crate::config::{PlaybackSettings, StreamSettings};
use crate::error::{HandlerError, Result};
use crate::sync::lock;

use super::codec::{DecodedStream, MediaSource, OutputFactory, StreamDecoder};
use super::retry::{BufferedRetryReader, RetryPolicy};
use super::worker::{LoopCtrl, Worker};

/// Plays one stream at a time and reports completion and failures.
///
/// `play` while a session is active replaces the stream in place. Completion
/// and errors are delivered on channels that live as long as the handler.
pub trait StreamHandler: Send + Sync {
    /// Start playing `source`, or switch the active session over to it.
    fn play(&self, source: Box<dyn MediaSource>) -> Result<()>;

    /// End the session. No-op when nothing is playing.
    fn stop(&self);

    fn pause(&self);

    fn resume(&self);

    /// Fires once each time a stream reaches its end.
    fn finished(&self) -> Receiver<()>;

    /// Non-fatal errors raised while streaming.
    fn errors(&self) -> Receiver<HandlerError>;
}

/// Tuning for [`NativeStreamHandler`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HandlerSettings {
    pub chunk_size: usize,
    pub max_consecutive_errors: u32,
    pub retry: RetryPolicy,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self::new(&PlaybackSettings::default(), &StreamSettings::default())
    }
}

impl HandlerSettings {
    pub fn new(playback: &PlaybackSettings, stream: &StreamSettings) -> Self {
        Self {
            chunk_size: stream.chunk_size,
            max_consecutive_errors: stream.max_consecutive_read_errors,
            retry: RetryPolicy {
                initial_wait: playback.buffering_wait(),
                max_attempts: playback.max_read_retry_attempts,
            },
        }
    }
}

pub(super) struct Session {
    pub(super) id: u64,
    pub(super) ctrl: Sender<LoopCtrl>,
}

pub(super) type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Handler that decodes on the caller's thread and feeds an output device
/// from a dedicated worker thread.
pub struct NativeStreamHandler {
    decoder: Arc<dyn StreamDecoder>,
    outputs: Arc<dyn OutputFactory>,
    settings: HandlerSettings,
    session: SessionSlot,
    next_id: AtomicU64,
    finished_tx: Sender<()>,
    finished_rx: Receiver<()>,
    errors_tx: Sender<HandlerError>,
    errors_rx: Receiver<HandlerError>,
}

impl NativeStreamHandler {
    pub fn new(
        decoder: impl StreamDecoder + 'static,
        outputs: impl OutputFactory + 'static,
        settings: HandlerSettings,
    ) -> Self {
        let (finished_tx, finished_rx) = unbounded();
        let (errors_tx, errors_rx) = unbounded();
        Self {
            decoder: Arc::new(decoder),
            outputs: Arc::new(outputs),
            settings,
            session: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            finished_tx,
            finished_rx,
            errors_tx,
            errors_rx,
        }
    }

    pub fn settings(&self) -> HandlerSettings {
        self.settings
    }

    fn send(&self, ctrl: LoopCtrl) {
        if let Some(session) = lock(&self.session).as_ref() {
            let _ = session.ctrl.send(ctrl);
        }
    }

    fn spawn_session(
        &self,
        slot: &mut Option<Session>,
        stream: Box<dyn DecodedStream>,
    ) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (ctrl_tx, ctrl_rx) = unbounded();
        let (ready_tx, ready_rx) = bounded(1);
        let worker = Worker {
            id,
            ctrl: ctrl_rx,
            session: Arc::clone(&self.session),
            outputs: Arc::clone(&self.outputs),
            finished: self.finished_tx.clone(),
            errors: self.errors_tx.clone(),
            settings: self.settings,
        };

        thread::Builder::new()
            .name("stream-worker".into())
            .spawn(move || worker.run(stream, ready_tx))
            .map_err(|e| HandlerError::Device(format!("cannot spawn stream worker: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!(session = id, "playback session started");
                *slot = Some(Session { id, ctrl: ctrl_tx });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HandlerError::Device(
                "stream worker exited before opening the device".into(),
            )),
        }
    }
}

impl StreamHandler for NativeStreamHandler {
    fn play(&self, source: Box<dyn MediaSource>) -> Result<()> {
        let source = BufferedRetryReader::new(source, self.settings.retry);
        let stream = self.decoder.decode(Box::new(source))?;

        // The slot stays locked until the new session is registered so a
        // worker that is winding down cannot miss the switch.
        let mut slot = lock(&self.session);
        let stream = match slot.as_ref() {
            Some(session) => match session.ctrl.send(LoopCtrl::Switch(stream)) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(session = session.id, "stream worker gone, starting a new session");
                    match err.into_inner() {
                        LoopCtrl::Switch(stream) => stream,
                        _ => return Err(HandlerError::Device("lost stream on switch".into())),
                    }
                }
            },
            None => stream,
        };
        *slot = None;
        self.spawn_session(&mut slot, stream)
    }

    fn stop(&self) {
        if let Some(session) = lock(&self.session).take() {
            debug!(session = session.id, "stopping playback session");
            let _ = session.ctrl.send(LoopCtrl::Stop);
        }
    }

    fn pause(&self) {
        self.send(LoopCtrl::Pause);
    }

    fn resume(&self) {
        self.send(LoopCtrl::Resume);
    }

    fn finished(&self) -> Receiver<()> {
        self.finished_rx.clone()
    }

    fn errors(&self) -> Receiver<HandlerError> {
        self.errors_rx.clone()
    }
}

impl Drop for NativeStreamHandler {
    fn drop(&mut self) {
        self.stop();
    }
}
