//! Error types for device I/O.
//!
//! Only two kinds of failure abort a loop:
//! - [`AudioError::DeviceUnavailable`]: the line cannot be provided at all,
//!   the loop never starts.
//! - [`AudioError::DeviceAccess`]: the line was found but opening, reading or
//!   writing it failed. The affected loop stops and cleans up its own device.
//!
//! Zero-length reads and recoverable overruns are not errors; devices report
//! them as `Ok(0)` and the loops carry on.

use std::fmt;

/// Which side of the conversation a device serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Capture,
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Capture => f.write_str("capture"),
            Direction::Playback => f.write_str("playback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The platform cannot provide a line for the requested format.
    #[error("{direction} line unavailable on '{device}': {reason}")]
    DeviceUnavailable {
        direction: Direction,
        device: String,
        reason: String,
    },

    /// The device is busy, denied, or went away mid-stream.
    #[error("{direction} device '{device}' failed: {reason}")]
    DeviceAccess {
        direction: Direction,
        device: String,
        reason: String,
    },
}

impl AudioError {
    pub fn unavailable(
        direction: Direction,
        device: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::DeviceUnavailable {
            direction,
            device: device.into(),
            reason: reason.to_string(),
        }
    }

    pub fn access(
        direction: Direction,
        device: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self::DeviceAccess {
            direction,
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AudioError::unavailable(Direction::Capture, "hw:1,0", "no S16_LE support");
        assert_eq!(
            err.to_string(),
            "capture line unavailable on 'hw:1,0': no S16_LE support"
        );

        let err = AudioError::access(Direction::Playback, "default", "device busy");
        assert_eq!(err.to_string(), "playback device 'default' failed: device busy");
    }
}
