//! First-read backoff for sources that are still being filled.

use std::io::{self, Read, Seek, SeekFrom};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

/// Backoff used on the first read of a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep before the first retry; doubled on every further retry.
    pub initial_wait: Duration,
    /// Total read attempts, the initial read included.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(200),
            max_attempts: 5,
        }
    }
}

/// Reader that tolerates a producer which has not delivered bytes yet.
///
/// Only the very first read retries on end-of-data. Once a stream has started
/// flowing, an empty read is taken as the real end of the track.
pub struct BufferedRetryReader<R> {
    inner: R,
    policy: RetryPolicy,
    first_read_done: bool,
}

impl<R> BufferedRetryReader<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            first_read_done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> BufferedRetryReader<R> {
    fn read_with_backoff(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wait = self.policy.initial_wait;
        let mut attempt = 1;
        loop {
            if attempt >= self.policy.max_attempts {
                debug!(attempts = attempt, "source still empty, giving up");
                return Ok(0);
            }
            trace!(attempt, ?wait, "source empty on first read, backing off");
            thread::sleep(wait);
            let n = self.inner.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            wait *= 2;
            attempt += 1;
        }
    }
}

impl<R: Read> Read for BufferedRetryReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.first_read_done || buf.is_empty() {
            return self.inner.read(buf);
        }
        self.first_read_done = true;
        match self.inner.read(buf)? {
            0 => self.read_with_backoff(buf),
            n => Ok(n),
        }
    }
}

impl<R: Seek> Seek for BufferedRetryReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
