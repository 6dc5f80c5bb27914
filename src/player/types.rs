//! Small player types shared by the public API and the control loop.

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{Provider, Track};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Status snapshot handed to the periodic callback.
#[derive(Debug, Clone)]
pub struct CallbackData {
    pub track: Arc<Track>,
    /// Time spent playing the track, paused time excluded.
    pub duration: Duration,
}

/// Periodic status callback. Runs on the control thread; keep it short.
pub type Callback = Box<dyn Fn(&CallbackData) + Send>;

pub(super) enum PlayerCmd {
    Play,
    Pause,
    PlayPause,
    Stop,
    Next,
    Previous,
    /// Replace the upcoming queue.
    SetQueue(Vec<Arc<Track>>),
    UpdateProvider(Arc<dyn Provider>),
    Close,
    /// Acknowledged once every earlier command has been handled.
    #[cfg(test)]
    Barrier(crossbeam_channel::Sender<()>),
}
