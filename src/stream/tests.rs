use super::*;
use crate::error::HandlerError;

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Reader replaying a script of read results, then reporting end of data.
struct Scripted {
    steps: VecDeque<io::Result<Vec<u8>>>,
    reads: Arc<AtomicUsize>,
}

impl Scripted {
    fn new(steps: Vec<io::Result<Vec<u8>>>) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let reader = Self {
            steps: steps.into(),
            reads: Arc::clone(&reads),
        };
        (reader, reads)
    }
}

impl Read for Scripted {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }
}

impl Seek for Scripted {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "not seekable"))
    }
}

/// Never runs dry. Every byte is `1`.
struct Endless;

impl Read for Endless {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        buf.fill(1);
        Ok(buf.len())
    }
}

impl Seek for Endless {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Ok(0)
    }
}

fn empty_reads(n: usize) -> Vec<io::Result<Vec<u8>>> {
    (0..n).map(|_| Ok(Vec::new())).collect()
}

fn policy(wait_ms: u64, max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        initial_wait: Duration::from_millis(wait_ms),
        max_attempts,
    }
}

#[test]
fn first_read_with_data_does_not_wait() {
    let (inner, reads) = Scripted::new(vec![Ok(b"abc".to_vec())]);
    let mut reader = BufferedRetryReader::new(inner, policy(500, 5));
    let mut buf = [0u8; 8];

    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 3);
    assert!(start.elapsed() < Duration::from_millis(250));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn first_read_backs_off_once() {
    let mut steps = empty_reads(1);
    steps.push(Ok(b"data".to_vec()));
    let (inner, reads) = Scripted::new(steps);
    let mut reader = BufferedRetryReader::new(inner, policy(100, 5));
    let mut buf = [0u8; 8];

    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 4);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(190), "{elapsed:?}");
    assert_eq!(&buf[..4], b"data");
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn first_read_doubles_the_wait() {
    let mut steps = empty_reads(2);
    steps.push(Ok(b"x".to_vec()));
    let (inner, reads) = Scripted::new(steps);
    let mut reader = BufferedRetryReader::new(inner, policy(50, 5));
    let mut buf = [0u8; 8];

    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 1);
    // 50ms + 100ms; a third sleep would add 200ms
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(150), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    assert_eq!(reads.load(Ordering::SeqCst), 3);
}

#[test]
fn first_read_gives_up_after_max_attempts() {
    let (inner, reads) = Scripted::new(Vec::new());
    let mut reader = BufferedRetryReader::new(inner, policy(20, 5));
    let mut buf = [0u8; 8];

    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
    // 20 + 40 + 80 + 160; a fifth sleep would add 320ms
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(550), "{elapsed:?}");
    assert_eq!(reads.load(Ordering::SeqCst), 5);
}

#[test]
fn single_attempt_policy_never_sleeps() {
    let (inner, reads) = Scripted::new(Vec::new());
    let mut reader = BufferedRetryReader::new(inner, policy(500, 1));
    let mut buf = [0u8; 8];

    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
    assert!(start.elapsed() < Duration::from_millis(250));
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn later_reads_are_not_retried() {
    let (inner, reads) = Scripted::new(vec![Ok(b"ab".to_vec())]);
    let mut reader = BufferedRetryReader::new(inner, policy(500, 5));
    let mut buf = [0u8; 8];

    assert_eq!(reader.read(&mut buf).unwrap(), 2);
    let start = Instant::now();
    assert_eq!(reader.read(&mut buf).unwrap(), 0);
    assert!(start.elapsed() < Duration::from_millis(250));
    assert_eq!(reads.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_buffer_does_not_use_up_the_retry() {
    let mut steps = empty_reads(1);
    steps.push(Ok(b"z".to_vec()));
    let (inner, _) = Scripted::new(steps);
    let mut reader = BufferedRetryReader::new(inner, policy(10, 5));

    assert_eq!(reader.read(&mut []).unwrap(), 0);
    let mut buf = [0u8; 4];
    assert_eq!(reader.read(&mut buf).unwrap(), 1);
}

#[test]
fn first_read_errors_propagate() {
    let (inner, _) = Scripted::new(vec![Err(io::Error::other("network down"))]);
    let mut reader = BufferedRetryReader::new(inner, policy(10, 5));
    let mut buf = [0u8; 4];

    assert!(reader.read(&mut buf).is_err());
}

// Handler tests use a decoder that passes bytes straight through. The
// first byte of every source picks the sample rate (byte * 1000 Hz).

struct RawStream {
    source: Box<dyn MediaSource>,
    sample_rate: u32,
}

impl Read for RawStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.source.read(buf)
    }
}

impl DecodedStream for RawStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        2
    }
}

struct RawDecoder;

impl StreamDecoder for RawDecoder {
    fn decode(
        &self,
        mut source: Box<dyn MediaSource>,
    ) -> crate::error::Result<Box<dyn DecodedStream>> {
        let mut header = [0u8; 1];
        match source.read(&mut header) {
            Ok(1) => Ok(Box::new(RawStream {
                source,
                sample_rate: u32::from(header[0]) * 1000,
            })),
            Ok(_) => Err(HandlerError::Decode("empty stream".into())),
            Err(e) => Err(HandlerError::Decode(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Open(u32),
    Write(Vec<u8>),
    Pause,
    Resume,
    Close,
}

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    fail_open: bool,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn written(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    fn writes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Write(_)))
            .count()
    }
}

struct RecordingDevice(Arc<Mutex<Vec<Event>>>);

impl OutputDevice for RecordingDevice {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().push(Event::Write(chunk.to_vec()));
        thread::sleep(Duration::from_millis(1));
        Ok(chunk.len())
    }

    fn pause(&mut self) {
        self.0.lock().unwrap().push(Event::Pause);
    }

    fn resume(&mut self) {
        self.0.lock().unwrap().push(Event::Resume);
    }

    fn close(&mut self) -> crate::error::Result<()> {
        self.0.lock().unwrap().push(Event::Close);
        Ok(())
    }
}

impl OutputFactory for Recorder {
    fn open(
        &self,
        sample_rate: u32,
        _channels: u16,
    ) -> crate::error::Result<Box<dyn OutputDevice>> {
        if self.fail_open {
            return Err(HandlerError::Device("no device".into()));
        }
        self.events.lock().unwrap().push(Event::Open(sample_rate));
        Ok(Box::new(RecordingDevice(Arc::clone(&self.events))))
    }
}

fn handler(recorder: &Recorder) -> NativeStreamHandler {
    NativeStreamHandler::new(
        RawDecoder,
        recorder.clone(),
        HandlerSettings {
            chunk_size: 4,
            max_consecutive_errors: 2,
            retry: policy(5, 3),
        },
    )
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn cursor(bytes: &[u8]) -> Box<dyn MediaSource> {
    Box::new(Cursor::new(bytes.to_vec()))
}

#[test]
fn handler_writes_every_chunk_then_signals_finished() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    let finished = handler.finished();

    handler.play(cursor(&[44, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10])).unwrap();
    finished.recv_timeout(Duration::from_secs(3)).unwrap();

    assert_eq!(recorder.written(), (1..=10).collect::<Vec<u8>>());
    assert_eq!(recorder.events()[0], Event::Open(44_000));
    assert_eq!(recorder.count(&Event::Close), 0);

    handler.stop();
    wait_until("device close", || recorder.count(&Event::Close) == 1);
}

#[test]
fn stop_without_session_is_a_noop() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    handler.stop();
    handler.pause();
    handler.resume();
    assert!(recorder.events().is_empty());
}

#[test]
fn play_reports_decode_failure() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);

    assert!(matches!(handler.play(cursor(&[])), Err(HandlerError::Decode(_))));
    assert!(recorder.events().is_empty());
}

#[test]
fn play_reports_device_open_failure() {
    let recorder = Recorder {
        fail_open: true,
        ..Recorder::default()
    };
    let handler = handler(&recorder);

    assert!(matches!(handler.play(cursor(&[44, 1, 2])), Err(HandlerError::Device(_))));
}

#[test]
fn switch_keeps_device_when_format_matches() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    let finished = handler.finished();

    handler.play(cursor(&[44, 1, 2])).unwrap();
    finished.recv_timeout(Duration::from_secs(3)).unwrap();
    handler.play(cursor(&[44, 3, 4])).unwrap();
    finished.recv_timeout(Duration::from_secs(3)).unwrap();

    assert_eq!(recorder.written(), vec![1, 2, 3, 4]);
    assert_eq!(recorder.count(&Event::Open(44_000)), 1);
    assert_eq!(recorder.count(&Event::Close), 0);
}

#[test]
fn switch_reopens_device_when_format_changes() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    let finished = handler.finished();

    handler.play(cursor(&[44, 1, 2])).unwrap();
    finished.recv_timeout(Duration::from_secs(3)).unwrap();
    handler.play(cursor(&[48, 3, 4])).unwrap();
    finished.recv_timeout(Duration::from_secs(3)).unwrap();

    let events = recorder.events();
    let opens: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, Event::Open(_)))
        .cloned()
        .collect();
    assert_eq!(opens, vec![Event::Open(44_000), Event::Open(48_000)]);
    assert_eq!(recorder.count(&Event::Close), 1);
}

#[test]
fn pause_holds_writes_until_resume() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);

    handler.play(Box::new(Endless)).unwrap();
    wait_until("first writes", || recorder.writes() > 2);

    handler.pause();
    wait_until("device pause", || recorder.count(&Event::Pause) == 1);
    let frozen = recorder.writes();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.writes(), frozen);

    handler.resume();
    wait_until("writes after resume", || recorder.writes() > frozen);
    assert_eq!(recorder.count(&Event::Resume), 1);

    handler.stop();
    wait_until("device close", || recorder.count(&Event::Close) == 1);
}

#[test]
fn switch_while_paused_resumes_playback() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);

    handler.play(Box::new(Endless)).unwrap();
    handler.pause();
    wait_until("device pause", || recorder.count(&Event::Pause) == 1);

    handler.play(cursor(&[1, 9, 9])).unwrap();
    handler
        .finished()
        .recv_timeout(Duration::from_secs(3))
        .unwrap();
    assert_eq!(recorder.count(&Event::Resume), 1);
    assert!(recorder.written().ends_with(&[9, 9]));
}

#[test]
fn recoverable_read_errors_are_forwarded() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    let errors = handler.errors();
    let (source, _) = Scripted::new(vec![
        Ok(vec![44]),
        Ok(vec![1, 2]),
        Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame")),
        Ok(vec![3, 4]),
    ]);

    handler.play(Box::new(source)).unwrap();
    handler
        .finished()
        .recv_timeout(Duration::from_secs(3))
        .unwrap();

    assert!(matches!(errors.try_recv(), Ok(HandlerError::Read(_))));
    assert_eq!(recorder.written(), vec![1, 2, 3, 4]);
}

#[test]
fn fatal_read_error_ends_the_session() {
    let recorder = Recorder::default();
    let handler = handler(&recorder);
    let errors = handler.errors();
    let (source, _) = Scripted::new(vec![Ok(vec![44]), Err(io::Error::other("gone"))]);

    handler.play(Box::new(source)).unwrap();
    let err = errors.recv_timeout(Duration::from_secs(3)).unwrap();
    assert!(matches!(err, HandlerError::Read(_)));
    wait_until("device close", || recorder.count(&Event::Close) == 1);
    assert!(handler.finished().try_recv().is_err());

    // The next play starts a fresh session.
    handler.play(cursor(&[44, 5])).unwrap();
    handler
        .finished()
        .recv_timeout(Duration::from_secs(3))
        .unwrap();
    assert_eq!(recorder.count(&Event::Open(44_000)), 2);
}

#[test]
fn handler_settings_follow_config() {
    let settings = HandlerSettings::default();
    assert_eq!(settings.chunk_size, 8192);
    assert_eq!(settings.retry, RetryPolicy::default());
}
