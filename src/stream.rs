//! Stream handling: first-read retry, decode, and device output.
//!
//! [`NativeStreamHandler`] runs one playback session at a time on a worker
//! thread. Decoding and output are injected through [`StreamDecoder`] and
//! [`OutputFactory`]; the `rodio` implementations live in [`backend`].

pub mod backend;
mod codec;
mod handler;
mod retry;
mod worker;

pub use codec::{DecodedStream, MediaSource, OutputDevice, OutputFactory, StreamDecoder};
pub use handler::{HandlerSettings, NativeStreamHandler, StreamHandler};
pub use retry::{BufferedRetryReader, RetryPolicy};

#[cfg(test)]
mod tests;
