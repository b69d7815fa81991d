//! Hardware-free audio lines for tests.
//!
//! [`ScriptedCapture`] replays a fixed list of read results,
//! [`RecordingPlayback`] keeps every payload it is given, and [`MockHost`]
//! hands them out the way a real host would. Every device call is appended to
//! a shared [`LineCall`] log so tests can assert on exact call order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::device::{AudioFormat, AudioHost, CaptureLine, PlaybackLine};
use super::error::{AudioError, Direction};
use crate::lifecycle::LifecycleFlags;

const MOCK_DEVICE: &str = "mock";

/// A device call as seen by a mock line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCall {
    Read(usize),
    Write(usize),
    Drain,
    Stop,
    Close,
}

pub type CallLog = Arc<Mutex<Vec<LineCall>>>;

/// One scripted result for [`ScriptedCapture::read`].
#[derive(Debug, Clone)]
pub enum ReadStep {
    /// Yield this many bytes (capped at the buffer length).
    Bytes(usize),
    /// Fail with a device access error.
    Fail(String),
}

/// Byte written at `index` of the `read`-th read (both zero based).
pub fn pattern_byte(read: usize, index: usize) -> u8 {
    (read.wrapping_mul(31).wrapping_add(index) % 251) as u8
}

/// Capture line that replays a script, then yields empty reads.
pub struct ScriptedCapture {
    steps: VecDeque<ReadStep>,
    reads: usize,
    stop_after: Option<(usize, Arc<LifecycleFlags>)>,
    calls: CallLog,
}

impl ScriptedCapture {
    pub fn new(steps: Vec<ReadStep>) -> Self {
        Self {
            steps: steps.into(),
            reads: 0,
            stop_after: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Convenience for a script of successful reads.
    pub fn from_sizes(sizes: &[usize]) -> Self {
        Self::new(sizes.iter().map(|&n| ReadStep::Bytes(n)).collect())
    }

    /// Clear `flags.running` once `reads` reads have completed.
    pub fn stop_after(mut self, reads: usize, flags: Arc<LifecycleFlags>) -> Self {
        self.stop_after = Some((reads, flags));
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn log(&self, call: LineCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl CaptureLine for ScriptedCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        let read_no = self.reads;
        self.reads += 1;

        let result = match self.steps.pop_front() {
            Some(ReadStep::Bytes(n)) => {
                let n = n.min(buf.len());
                for (i, byte) in buf[..n].iter_mut().enumerate() {
                    *byte = pattern_byte(read_no, i);
                }
                Ok(n)
            }
            Some(ReadStep::Fail(reason)) => {
                Err(AudioError::access(Direction::Capture, MOCK_DEVICE, reason))
            }
            None => {
                // Stand in for a blocking read that returned nothing.
                thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
        };

        self.log(LineCall::Read(*result.as_ref().unwrap_or(&0)));
        if let Some((after, flags)) = &self.stop_after {
            if self.reads == *after {
                flags.stop();
            }
        }
        result
    }

    fn stop(&mut self) {
        self.log(LineCall::Stop);
    }

    fn close(&mut self) {
        self.log(LineCall::Close);
    }
}

/// Playback line that records every payload written to it.
pub struct RecordingPlayback {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    calls: CallLog,
    fail_write_at: Option<usize>,
    fail_drain: bool,
    writes: usize,
}

impl RecordingPlayback {
    pub fn new() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_write_at: None,
            fail_drain: false,
            writes: 0,
        }
    }

    /// Make the `nth` write (1 based) fail with a device access error.
    pub fn fail_write_at(mut self, nth: usize) -> Self {
        self.fail_write_at = Some(nth);
        self
    }

    pub fn fail_drain(mut self) -> Self {
        self.fail_drain = true;
        self
    }

    pub fn written(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.written.clone()
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn log(&self, call: LineCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Default for RecordingPlayback {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackLine for RecordingPlayback {
    fn write(&mut self, data: &[u8]) -> Result<usize, AudioError> {
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            return Err(AudioError::access(
                Direction::Playback,
                MOCK_DEVICE,
                "device disconnected",
            ));
        }
        self.log(LineCall::Write(data.len()));
        if let Ok(mut written) = self.written.lock() {
            written.push(data.to_vec());
        }
        Ok(data.len())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        self.log(LineCall::Drain);
        if self.fail_drain {
            return Err(AudioError::access(Direction::Playback, MOCK_DEVICE, "drain failed"));
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.log(LineCall::Stop);
    }

    fn close(&mut self) {
        self.log(LineCall::Close);
    }
}

/// Host that hands out each configured line at most once.
///
/// A direction with no line configured (or already handed out) reports
/// `DeviceUnavailable`, which mirrors a platform without line support and
/// catches any attempt to open a device twice.
#[derive(Default)]
pub struct MockHost {
    capture: Mutex<Option<Box<dyn CaptureLine>>>,
    playback: Mutex<Option<Box<dyn PlaybackLine + Send>>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capture(self, line: impl CaptureLine + 'static) -> Self {
        if let Ok(mut slot) = self.capture.lock() {
            *slot = Some(Box::new(line));
        }
        self
    }

    pub fn with_playback(self, line: impl PlaybackLine + Send + 'static) -> Self {
        if let Ok(mut slot) = self.playback.lock() {
            *slot = Some(Box::new(line));
        }
        self
    }
}

impl AudioHost for MockHost {
    fn open_capture(&self, _format: &AudioFormat) -> Result<Box<dyn CaptureLine>, AudioError> {
        self.capture
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| {
                AudioError::unavailable(Direction::Capture, MOCK_DEVICE, "line not supported")
            })
    }

    fn open_playback(&self, _format: &AudioFormat) -> Result<Box<dyn PlaybackLine>, AudioError> {
        self.playback
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(|line| line as Box<dyn PlaybackLine>)
            .ok_or_else(|| {
                AudioError::unavailable(Direction::Playback, MOCK_DEVICE, "line not supported")
            })
    }
}
