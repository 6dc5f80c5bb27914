//! Decoder and output device capabilities consumed by the stream handler.

use std::io::{self, Read, Seek};

use crate::error::Result;

/// Encoded audio the handler can decode: readable, seekable and movable
/// to the worker thread.
pub trait MediaSource: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> MediaSource for T {}

/// A decoded stream yielding interleaved signed 16-bit little-endian PCM.
pub trait DecodedStream: Read + Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;
}

/// Turns an encoded source into PCM. Decoding the header happens here, so
/// a source that is not audio fails before playback starts.
pub trait StreamDecoder: Send + Sync {
    fn decode(&self, source: Box<dyn MediaSource>) -> Result<Box<dyn DecodedStream>>;
}

/// An open audio output. Owned by the handler's worker thread only.
pub trait OutputDevice {
    /// Queue one chunk of PCM. May block to pace the caller with playback.
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize>;

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn close(&mut self) -> Result<()>;
}

/// Opens output devices. Called on the worker thread, so devices need not be `Send`.
pub trait OutputFactory: Send + Sync {
    fn open(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn OutputDevice>>;
}
