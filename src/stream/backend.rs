//! `rodio`-backed decoder and output device.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::debug;

use crate::config::StreamSettings;
use crate::error::{HandlerError, Result};

use super::codec::{DecodedStream, MediaSource, OutputDevice, OutputFactory, StreamDecoder};

const PACING_SLEEP: Duration = Duration::from_millis(5);

/// Decodes anything `rodio` (symphonia) understands.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioDecoder;

impl StreamDecoder for RodioDecoder {
    fn decode(&self, source: Box<dyn MediaSource>) -> Result<Box<dyn DecodedStream>> {
        let decoder = Decoder::new(source).map_err(|e| HandlerError::Decode(e.to_string()))?;
        let sample_rate = decoder.sample_rate();
        let channels = decoder.channels();
        debug!(sample_rate, channels, "decoder ready");
        Ok(Box::new(RodioStream {
            decoder,
            sample_rate,
            channels,
        }))
    }
}

struct RodioStream {
    decoder: Decoder<Box<dyn MediaSource>>,
    sample_rate: u32,
    channels: u16,
}

impl Read for RodioStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.len() < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer too small for one sample",
            ));
        }
        let mut written = 0;
        for slot in buf.chunks_exact_mut(2) {
            let Some(sample) = self.decoder.next() else {
                break;
            };
            let pcm = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            slot.copy_from_slice(&pcm.to_le_bytes());
            written += 2;
        }
        Ok(written)
    }
}

impl DecodedStream for RodioStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

/// Opens the default output device through `rodio`.
#[derive(Debug, Clone, Copy)]
pub struct RodioOutput {
    max_queued_chunks: usize,
}

impl RodioOutput {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            max_queued_chunks: settings.max_queued_chunks,
        }
    }
}

impl OutputFactory for RodioOutput {
    fn open(&self, sample_rate: u32, channels: u16) -> Result<Box<dyn OutputDevice>> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| HandlerError::Device(e.to_string()))?;
        // rodio logs to stderr when OutputStream is dropped.
        stream.log_on_drop(false);
        let sink = Sink::connect_new(stream.mixer());
        Ok(Box::new(RodioDevice {
            _stream: stream,
            sink,
            sample_rate,
            channels,
            max_queued_chunks: self.max_queued_chunks,
        }))
    }
}

struct RodioDevice {
    _stream: OutputStream,
    sink: Sink,
    sample_rate: u32,
    channels: u16,
    max_queued_chunks: usize,
}

impl OutputDevice for RodioDevice {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        let samples: Vec<f32> = chunk
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / 32768.0)
            .collect();
        self.sink
            .append(SamplesBuffer::new(self.channels, self.sample_rate, samples));
        // Keep the caller roughly in step with what is audible.
        while self.sink.len() > self.max_queued_chunks {
            thread::sleep(PACING_SLEEP);
        }
        Ok(chunk.len())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn resume(&mut self) {
        self.sink.play();
    }

    fn close(&mut self) -> Result<()> {
        self.sink.stop();
        Ok(())
    }
}
