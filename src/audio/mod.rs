//! audio - Device I/O for a live conversation
//!
//! Capture and playback run as plain blocking loops over exclusively owned
//! lines. ALSA provides the real lines; `mock` (behind the `mock` feature)
//! provides scripted ones.

mod alsa_device;
mod capture;
mod device;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod playback;

pub use alsa_device::{AlsaCapture, AlsaHost, AlsaPlayback};
pub use capture::{CaptureProducer, CaptureStats, DEFAULT_BLOCK_SIZE};
pub use device::{
    ActiveCapture, ActivePlayback, AudioFormat, AudioHost, BYTES_PER_SAMPLE, CaptureLine,
    LineState, PCM_MIME_TYPE, PlaybackLine,
};
pub use error::{AudioError, Direction};
pub use playback::{PlaybackConsumer, PlaybackStats};
