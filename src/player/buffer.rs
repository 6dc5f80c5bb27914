//! In-memory prefetch buffer between the network copy and the decoder.
//!
//! The copy thread appends through a [`PrefetchWriter`]; the stream handler
//! reads through a [`PrefetchReader`] with its own cursor. Every reset or
//! retirement bumps a generation counter, and readers created for an older
//! generation read as ended so they never see the next track.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex};

use crate::sync::lock;

#[derive(Debug, Default)]
struct Contents {
    bytes: Vec<u8>,
    generation: u64,
}

#[derive(Debug)]
pub struct PrefetchBuffer {
    contents: Mutex<Contents>,
    /// `false` while a copy into the buffer is in flight.
    filled: Mutex<bool>,
}

impl Default for PrefetchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefetchBuffer {
    /// An empty buffer with no copy in flight.
    pub fn new() -> Self {
        Self {
            contents: Mutex::new(Contents::default()),
            filled: Mutex::new(true),
        }
    }

    pub fn is_filled(&self) -> bool {
        *lock(&self.filled)
    }

    pub fn set_filled(&self, filled: bool) {
        *lock(&self.filled) = filled;
    }

    /// Empty the buffer for a new track. Must not be called while a copy
    /// is in flight.
    pub fn reset(&self) {
        let mut contents = lock(&self.contents);
        contents.bytes.clear();
        contents.generation += 1;
        drop(contents);
        self.set_filled(false);
    }

    /// Invalidate existing readers without touching the data. Used when the
    /// buffer is replaced while its copy is still running.
    pub fn retire(&self) {
        lock(&self.contents).generation += 1;
    }

    pub fn len(&self) -> usize {
        lock(&self.contents).bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        lock(&self.contents).generation
    }

    pub fn reader(self: &Arc<Self>) -> PrefetchReader {
        PrefetchReader {
            buffer: Arc::clone(self),
            generation: self.generation(),
            pos: 0,
        }
    }

    pub fn writer(self: &Arc<Self>) -> PrefetchWriter {
        PrefetchWriter {
            buffer: Arc::clone(self),
        }
    }
}

pub struct PrefetchWriter {
    buffer: Arc<PrefetchBuffer>,
}

impl Write for PrefetchWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.buffer.contents).bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reads what has been copied so far. Reaching the end of the copied bytes
/// reads as end of data, even if the copy is still running.
pub struct PrefetchReader {
    buffer: Arc<PrefetchBuffer>,
    generation: u64,
    pos: u64,
}

impl Read for PrefetchReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let contents = lock(&self.buffer.contents);
        if contents.generation != self.generation {
            return Ok(0);
        }
        let start = usize::try_from(self.pos)
            .unwrap_or(usize::MAX)
            .min(contents.bytes.len());
        let n = buf.len().min(contents.bytes.len() - start);
        buf[..n].copy_from_slice(&contents.bytes[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for PrefetchReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let contents = lock(&self.buffer.contents);
        if contents.generation != self.generation {
            return Err(io::Error::other("prefetch buffer was reused"));
        }
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(off) => (contents.bytes.len() as u64).checked_add_signed(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
        };
        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            )),
        }
    }
}
