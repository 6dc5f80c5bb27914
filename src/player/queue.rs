//! Upcoming queue and play history.
//!
//! Both are stacks at the head: `push` and `pop` work on the front, so a
//! track pushed back by `stop` or `previous` is the next one out.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::catalog::Track;
use crate::sync::lock;

#[derive(Debug, Default)]
pub struct PlayQueue {
    tracks: Mutex<VecDeque<Arc<Track>>>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self) -> Option<Arc<Track>> {
        lock(&self.tracks).front().cloned()
    }

    pub fn pop(&self) -> Option<Arc<Track>> {
        lock(&self.tracks).pop_front()
    }

    pub fn push(&self, track: Arc<Track>) {
        lock(&self.tracks).push_front(track);
    }

    /// Drop the current contents and queue `tracks` in the given order.
    pub fn replace(&self, tracks: Vec<Arc<Track>>) {
        *lock(&self.tracks) = tracks.into();
    }

    pub fn len(&self) -> usize {
        lock(&self.tracks).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.tracks).is_empty()
    }

    /// Tracks in play order, head first.
    pub fn snapshot(&self) -> Vec<Arc<Track>> {
        lock(&self.tracks).iter().cloned().collect()
    }
}
