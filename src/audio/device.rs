//! Device handles and their lifecycle.
//!
//! A host hands out lines that are already open and running. From there the
//! only legal path is running → stopped → closed, and a closed line is never
//! touched again. [`ActiveCapture`] and [`ActivePlayback`] own a line and walk
//! it down that path exactly once, either through an explicit `shutdown()` or
//! on drop, so every return path of a loop (normal exit, early return, `?`)
//! releases the device.

use super::error::AudioError;

/// Bytes per sample. Samples are always signed 16-bit little-endian.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Media type attached to every captured chunk.
pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// Fixed PCM wire format, agreed with the backend out of band.
///
/// Samples are S16LE and interleaved; only rate and channel count vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

impl AudioFormat {
    /// 16 kHz mono, the format speech backends expect.
    pub const SPEECH: AudioFormat = AudioFormat {
        sample_rate: 16000,
        channels: 1,
    };

    pub fn new(sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Size of one interleaved frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        BYTES_PER_SAMPLE * self.channels as usize
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::SPEECH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Running,
    Stopped,
    Closed,
}

/// An open input line. Reads block until audio is available.
pub trait CaptureLine: Send {
    /// Read up to `buf.len()` bytes. `Ok(0)` means nothing usable was read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError>;
    fn stop(&mut self);
    fn close(&mut self);
}

/// An open output line. Writes block until the payload is queued.
pub trait PlaybackLine {
    fn write(&mut self, data: &[u8]) -> Result<usize, AudioError>;
    /// Block until everything written so far has been emitted.
    fn drain(&mut self) -> Result<(), AudioError>;
    fn stop(&mut self);
    fn close(&mut self);
}

/// Source of audio lines. Shared with the capture thread, hence `Sync`.
pub trait AudioHost: Send + Sync {
    fn open_capture(&self, format: &AudioFormat) -> Result<Box<dyn CaptureLine>, AudioError>;
    fn open_playback(&self, format: &AudioFormat) -> Result<Box<dyn PlaybackLine>, AudioError>;
}

/// Exclusive owner of a running capture line.
pub struct ActiveCapture {
    line: Box<dyn CaptureLine>,
    state: LineState,
}

impl ActiveCapture {
    pub fn new(line: Box<dyn CaptureLine>) -> Self {
        Self {
            line,
            state: LineState::Running,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        debug_assert_eq!(self.state, LineState::Running);
        self.line.read(buf)
    }

    /// Stop then close. Later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.state == LineState::Running {
            self.line.stop();
            self.state = LineState::Stopped;
        }
        if self.state == LineState::Stopped {
            self.line.close();
            self.state = LineState::Closed;
        }
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Exclusive owner of a running playback line.
pub struct ActivePlayback {
    line: Box<dyn PlaybackLine>,
    state: LineState,
}

impl ActivePlayback {
    pub fn new(line: Box<dyn PlaybackLine>) -> Self {
        Self {
            line,
            state: LineState::Running,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize, AudioError> {
        debug_assert_eq!(self.state, LineState::Running);
        self.line.write(data)
    }

    /// Drain, stop, then close. Later calls are no-ops.
    ///
    /// A failed drain is logged; stop and close still run.
    pub fn shutdown(&mut self) {
        if self.state == LineState::Running {
            if let Err(e) = self.line.drain() {
                log::warn!("Failed to drain playback line: {}", e);
            }
            self.line.stop();
            self.state = LineState::Stopped;
        }
        if self.state == LineState::Stopped {
            self.line.close();
            self.state = LineState::Closed;
        }
    }
}

impl Drop for ActivePlayback {
    fn drop(&mut self) {
        self.shutdown();
    }
}
