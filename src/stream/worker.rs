//! The playback session loop: decoded chunks in, device writes out.

use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::error::{HandlerError, Result};
use crate::sync::lock;

use super::codec::{DecodedStream, OutputDevice, OutputFactory};
use super::handler::{HandlerSettings, SessionSlot};

/// How long to wait for new data when the source has none yet.
const STARVED_WAIT: Duration = Duration::from_millis(20);

pub(super) enum LoopCtrl {
    Stop,
    Pause,
    Resume,
    Switch(Box<dyn DecodedStream>),
}

enum Flow {
    Continue,
    Exit,
}

struct Active {
    stream: Box<dyn DecodedStream>,
    device: Box<dyn OutputDevice>,
    format: (u32, u16),
    paused: bool,
    closed: bool,
}

impl Active {
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.close()
    }

    fn pause(&mut self) {
        if !self.paused {
            self.device.pause();
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        if self.paused {
            self.device.resume();
            self.paused = false;
        }
    }
}

pub(super) struct Worker {
    pub(super) id: u64,
    pub(super) ctrl: Receiver<LoopCtrl>,
    pub(super) session: SessionSlot,
    pub(super) outputs: Arc<dyn OutputFactory>,
    pub(super) finished: Sender<()>,
    pub(super) errors: Sender<HandlerError>,
    pub(super) settings: HandlerSettings,
}

impl Worker {
    pub(super) fn run(self, first: Box<dyn DecodedStream>, ready: Sender<Result<()>>) {
        let format = (first.sample_rate(), first.channels());
        let device = match self.outputs.open(format.0, format.1) {
            Ok(device) => device,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        let mut active = Active {
            stream: first,
            device,
            format,
            paused: false,
            closed: false,
        };

        loop {
            self.stream(&mut active);
            match self.take_pending() {
                Some((stream, paused)) => {
                    if let Flow::Exit = self.replace(&mut active, stream) {
                        break;
                    }
                    if paused {
                        active.pause();
                    } else {
                        active.resume();
                    }
                }
                None => break,
            }
        }

        debug!(session = self.id, "playback session ended");
        if let Err(e) = active.close() {
            self.report(e);
        }
    }

    fn report(&self, err: HandlerError) {
        debug!(session = self.id, error = %err, "stream error");
        let _ = self.errors.send(err);
    }

    /// Streams until told to stop or the session cannot continue.
    fn stream(&self, active: &mut Active) {
        let mut buf = vec![0u8; self.settings.chunk_size];
        let mut read_failures = 0u32;
        let mut write_failures = 0u32;

        loop {
            while let Ok(ctrl) = self.ctrl.try_recv() {
                if let Flow::Exit = self.apply(active, ctrl) {
                    return;
                }
            }

            if active.paused {
                match self.ctrl.recv() {
                    Ok(ctrl) => {
                        if let Flow::Exit = self.apply(active, ctrl) {
                            return;
                        }
                    }
                    Err(_) => return,
                }
                continue;
            }

            match active.stream.read(&mut buf) {
                Ok(0) => {
                    trace!(session = self.id, "end of stream");
                    let _ = self.finished.send(());
                    if let Flow::Exit = self.await_next(active) {
                        return;
                    }
                    read_failures = 0;
                }
                Ok(n) => {
                    read_failures = 0;
                    match active.device.write(&buf[..n]) {
                        Ok(_) => write_failures = 0,
                        Err(e) => {
                            write_failures += 1;
                            self.report(HandlerError::Write(e));
                            if write_failures > self.settings.max_consecutive_errors {
                                return;
                            }
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {
                    match self.ctrl.recv_timeout(STARVED_WAIT) {
                        Ok(ctrl) => {
                            if let Flow::Exit = self.apply(active, ctrl) {
                                return;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                }
                Err(e) => {
                    read_failures += 1;
                    let fatal = !is_recoverable(&e)
                        || read_failures > self.settings.max_consecutive_errors;
                    self.report(HandlerError::Read(e));
                    if fatal {
                        return;
                    }
                }
            }
        }
    }

    fn apply(&self, active: &mut Active, ctrl: LoopCtrl) -> Flow {
        match ctrl {
            LoopCtrl::Stop => Flow::Exit,
            LoopCtrl::Pause => {
                active.pause();
                Flow::Continue
            }
            LoopCtrl::Resume => {
                active.resume();
                Flow::Continue
            }
            LoopCtrl::Switch(stream) => {
                let flow = self.replace(active, stream);
                active.resume();
                flow
            }
        }
    }

    /// After end of stream: wait for the next stream or a stop. Pause state
    /// changes seen meanwhile carry over to the next stream.
    fn await_next(&self, active: &mut Active) -> Flow {
        loop {
            match self.ctrl.recv() {
                Ok(LoopCtrl::Stop) | Err(_) => return Flow::Exit,
                Ok(LoopCtrl::Pause) => active.pause(),
                Ok(LoopCtrl::Resume) => active.resume(),
                Ok(LoopCtrl::Switch(stream)) => return self.replace(active, stream),
            }
        }
    }

    /// Swap in a new stream, reopening the device only if the format changed.
    fn replace(&self, active: &mut Active, stream: Box<dyn DecodedStream>) -> Flow {
        let format = (stream.sample_rate(), stream.channels());
        if format != active.format {
            debug!(
                session = self.id,
                sample_rate = format.0,
                channels = format.1,
                "stream format changed, reopening device"
            );
            if let Err(e) = active.close() {
                self.report(e);
            }
            match self.outputs.open(format.0, format.1) {
                Ok(device) => {
                    active.device = device;
                    active.format = format;
                    active.closed = false;
                    if active.paused {
                        active.device.pause();
                    }
                }
                Err(e) => {
                    self.report(e);
                    return Flow::Exit;
                }
            }
        }
        active.stream = stream;
        Flow::Continue
    }

    /// Called as the session winds down. Under the slot lock, picks up a
    /// switch that raced with the exit, or unregisters the session.
    fn take_pending(&self) -> Option<(Box<dyn DecodedStream>, bool)> {
        let mut slot = lock(&self.session);
        if slot.as_ref().map(|s| s.id) != Some(self.id) {
            return None;
        }

        let mut pending = None;
        let mut paused = false;
        while let Ok(ctrl) = self.ctrl.try_recv() {
            match ctrl {
                LoopCtrl::Stop => pending = None,
                LoopCtrl::Pause => paused = true,
                LoopCtrl::Resume => paused = false,
                LoopCtrl::Switch(stream) => {
                    pending = Some(stream);
                    paused = false;
                }
            }
        }
        match pending {
            Some(stream) => Some((stream, paused)),
            None => {
                *slot = None;
                None
            }
        }
    }
}

fn is_recoverable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::InvalidData
            | ErrorKind::UnexpectedEof
            | ErrorKind::TimedOut
            | ErrorKind::WouldBlock
    )
}
