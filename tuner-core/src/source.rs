//! # Sample Source Module
//!
//! Where raw 8-bit samples come from. The tuner hardware streams unsigned
//! PCM bytes over a serial line and accepts a single control byte back to
//! toggle its distortion effect.
//!
//! ## Features
//! - [`SampleSource`] trait consumed by the driver loop
//! - Serial device source with a dedicated reader thread
//! - Synthetic tone source for running without hardware

use crate::error::{Result, TunerError};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Number of chunks the reader thread may queue ahead of the analysis thread.
const READER_QUEUE_DEPTH: usize = 64;

/// Pause before retrying after a read that delivered nothing.
const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// What the reader thread does when a read returns zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfInput {
    /// Zero bytes means end of stream (files, pipes, in-memory readers).
    Stop,
    /// Zero bytes means the line was quiet (a tty with a read timeout).
    Retry,
}

/// Control byte protocol understood by the microcontroller firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectCommand {
    /// Switch the distortion effect on (`0x01`).
    Enable,
    /// Switch the distortion effect off (`0x00`).
    Disable,
}

impl EffectCommand {
    pub fn byte(self) -> u8 {
        match self {
            EffectCommand::Enable => 0x01,
            EffectCommand::Disable => 0x00,
        }
    }

    pub fn from_enabled(enabled: bool) -> Self {
        if enabled { EffectCommand::Enable } else { EffectCommand::Disable }
    }
}

/// A producer of raw `u8` samples.
pub trait SampleSource {
    /// Waits at most `timeout` for up to `max_bytes` samples.
    ///
    /// Returning fewer bytes than requested (even none) is normal: the cycle
    /// simply proceeds with what arrived.
    fn read_chunk(&mut self, max_bytes: usize, timeout: Duration) -> Vec<u8>;

    /// Writes a control byte back to the device.
    fn send_command(&mut self, command: EffectCommand) -> Result<()>;

    /// True once the source will never deliver more samples.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Serial (or any byte stream) source fed by a background reader thread.
///
/// The thread performs blocking reads of `chunk_size` bytes and hands every
/// chunk over a bounded channel, so the analysis thread never blocks longer
/// than its own timeout.
pub struct SerialSource {
    receiver: Receiver<Vec<u8>>,
    writer: Box<dyn Write + Send>,
    pending: Vec<u8>,
    backlog_limit: usize,
    disconnected: bool,
}

impl SerialSource {
    /// Opens a serial device for reading samples and writing commands.
    ///
    /// Line settings are not touched. The device must already be in raw
    /// mode at the right baud rate, e.g. `stty -F /dev/ttyACM0 raw -echo 1000000`,
    /// otherwise the tty driver line-buffers the stream and interprets
    /// bytes such as `0x0A` and `0x04`.
    ///
    /// A read that returns no bytes is treated as a quiet line, never as
    /// the end of the stream.
    ///
    /// # Errors
    /// * `SourceUnavailable` - the device cannot be opened
    pub fn open(path: impl AsRef<Path>, chunk_size: usize, backlog_limit: usize) -> Result<Self> {
        let path = path.as_ref();
        let unavailable = |source| TunerError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(unavailable)?;
        let writer = device.try_clone().map_err(unavailable)?;

        info!(device = %path.display(), "opened sample source");
        Ok(Self::with_end_of_input(device, writer, chunk_size, backlog_limit, EndOfInput::Retry))
    }

    /// Builds a source from any reader/writer pair. A zero-byte read ends
    /// the stream.
    pub fn from_parts<R, W>(reader: R, writer: W, chunk_size: usize, backlog_limit: usize) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::with_end_of_input(reader, writer, chunk_size, backlog_limit, EndOfInput::Stop)
    }

    /// Builds a source with an explicit policy for zero-byte reads.
    ///
    /// Timeouts and `WouldBlock` are always retried. Any other read error
    /// stops the reader and the source reports itself exhausted once the
    /// queued samples are consumed.
    pub fn with_end_of_input<R, W>(
        reader: R,
        writer: W,
        chunk_size: usize,
        backlog_limit: usize,
        end_of_input: EndOfInput,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::bounded(READER_QUEUE_DEPTH);
        let chunk_size = chunk_size.max(1);

        thread::spawn(move || {
            let mut reader = reader;
            let mut buf = vec![0u8; chunk_size];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) if end_of_input == EndOfInput::Stop => {
                        debug!("sample stream reached end of input");
                        break;
                    }
                    Ok(0) => {
                        trace!("sample line quiet");
                        thread::sleep(IDLE_BACKOFF);
                    }
                    Ok(n) => {
                        if sender.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                        trace!(error = %e, "sample read timed out");
                        thread::sleep(IDLE_BACKOFF);
                    }
                    Err(e) => {
                        warn!(error = %e, "sample stream read failed, stopping reader");
                        break;
                    }
                }
            }
        });

        Self {
            receiver,
            writer: Box::new(writer),
            pending: Vec::new(),
            backlog_limit: backlog_limit.max(chunk_size),
            disconnected: false,
        }
    }
}

impl SampleSource for SerialSource {
    fn read_chunk(&mut self, max_bytes: usize, timeout: Duration) -> Vec<u8> {
        let deadline = Instant::now() + timeout;
        while self.pending.len() < max_bytes && !self.disconnected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(bytes) => self.pending.extend_from_slice(&bytes),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    info!("sample source closed");
                    self.disconnected = true;
                }
            }
        }

        let take = self.pending.len().min(max_bytes);
        let chunk: Vec<u8> = self.pending.drain(..take).collect();
        if chunk.len() < max_bytes {
            trace!(requested = max_bytes, received = chunk.len(), "short read");
        }

        if self.pending.len() > self.backlog_limit {
            let excess = self.pending.len() - self.backlog_limit;
            self.pending.drain(..excess);
            trace!(dropped = excess, "analysis is behind the source, dropping oldest bytes");
        }
        chunk
    }

    fn send_command(&mut self, command: EffectCommand) -> Result<()> {
        self.writer.write_all(&[command.byte()])?;
        self.writer.flush()?;
        debug!(?command, "sent effect command");
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.disconnected && self.pending.is_empty()
    }
}

/// Synthetic 8-bit tone, biased around mid-scale like the real ADC.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency: f32,
    sample_rate: u32,
    amplitude: f32,
    /// Relative amplitudes of partials 2, 3, ...
    harmonics: Vec<f32>,
    position: u64,
    realtime: bool,
    effect_enabled: bool,
}

impl ToneSource {
    /// A pure tone at `frequency` Hz with amplitude 100 around mid-scale.
    pub fn new(frequency: f32, sample_rate: u32) -> Self {
        Self {
            frequency,
            sample_rate,
            amplitude: 100.0,
            harmonics: Vec::new(),
            position: 0,
            realtime: false,
            effect_enabled: false,
        }
    }

    /// Adds overtones; the total is rescaled so samples never clip.
    pub fn with_harmonics(mut self, harmonics: Vec<f32>) -> Self {
        self.harmonics = harmonics;
        self
    }

    /// Paces reads to the nominal sample rate like a live device would.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn effect_enabled(&self) -> bool {
        self.effect_enabled
    }

    fn sample_at(&self, index: u64) -> u8 {
        let t = index as f64 / self.sample_rate as f64;
        let omega = 2.0 * std::f64::consts::PI * self.frequency as f64 * t;
        let mut value = omega.sin();
        let mut total = 1.0;
        for (i, &gain) in self.harmonics.iter().enumerate() {
            value += gain as f64 * (omega * (i + 2) as f64).sin();
            total += gain.abs() as f64;
        }
        let scaled = 128.0 + self.amplitude as f64 * value / total;
        scaled.round().clamp(0.0, 255.0) as u8
    }

    /// Generates the next `count` samples.
    pub fn generate(&mut self, count: usize) -> Vec<u8> {
        let samples = (0..count as u64).map(|i| self.sample_at(self.position + i)).collect();
        self.position += count as u64;
        samples
    }
}

impl SampleSource for ToneSource {
    fn read_chunk(&mut self, max_bytes: usize, timeout: Duration) -> Vec<u8> {
        if self.realtime {
            let duration = Duration::from_secs_f64(max_bytes as f64 / self.sample_rate as f64);
            thread::sleep(duration.min(timeout));
        }
        self.generate(max_bytes)
    }

    fn send_command(&mut self, command: EffectCommand) -> Result<()> {
        self.effect_enabled = command == EffectCommand::Enable;
        debug!(?command, "simulated effect command");
        Ok(())
    }
}

/// Readers with a fixed sequence of read outcomes, shared by the tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::io::{self, ErrorKind, Read};

    /// Replays `steps` in order. Once they run out, every read fails with
    /// `then`, which should be a timeout for a line that stays quiet or a
    /// hard error to stop the reader.
    pub(crate) struct ScriptedReader {
        steps: VecDeque<io::Result<Vec<u8>>>,
        then: ErrorKind,
    }

    impl ScriptedReader {
        pub(crate) fn new(steps: Vec<io::Result<Vec<u8>>>, then: ErrorKind) -> Self {
            Self { steps: steps.into(), then }
        }
    }

    pub(crate) fn timed_out() -> io::Result<Vec<u8>> {
        Err(io::Error::new(ErrorKind::TimedOut, "no data within the line timeout"))
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Ok(mut bytes)) => {
                    if bytes.len() > buf.len() {
                        let rest = bytes.split_off(buf.len());
                        self.steps.push_front(Ok(rest));
                    }
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                    Err(io::Error::new(self.then, "script finished"))
                }
            }
        }
    }
}
