//! ALSA PCM lines for capture and playback.

use std::borrow::Cow;

use alsa::pcm::{Access, Format, HwParams, PCM};
use alsa::{Direction as PcmDirection, ValueOr};

use super::device::{AudioFormat, AudioHost, CaptureLine, PlaybackLine};
use super::error::{AudioError, Direction};

/// Give up on a write after this many XRUN recoveries in a row.
const MAX_RECOVERY_RETRIES: u32 = 3;

/// Opens ALSA devices by name (e.g. "default", "plughw:0,0").
#[derive(Debug, Clone)]
pub struct AlsaHost {
    capture_device: String,
    playback_device: String,
}

impl AlsaHost {
    pub fn new(capture_device: impl Into<String>, playback_device: impl Into<String>) -> Self {
        Self {
            capture_device: capture_device.into(),
            playback_device: playback_device.into(),
        }
    }
}

impl Default for AlsaHost {
    fn default() -> Self {
        Self::new("default", "default")
    }
}

impl AudioHost for AlsaHost {
    fn open_capture(&self, format: &AudioFormat) -> Result<Box<dyn CaptureLine>, AudioError> {
        let pcm = open_pcm(&self.capture_device, Direction::Capture, format)?;
        pcm.start()
            .map_err(|e| AudioError::access(Direction::Capture, &self.capture_device, e))?;
        Ok(Box::new(AlsaCapture {
            device: self.capture_device.clone(),
            frame_bytes: format.frame_bytes(),
            pcm: Some(pcm),
        }))
    }

    fn open_playback(&self, format: &AudioFormat) -> Result<Box<dyn PlaybackLine>, AudioError> {
        let pcm = open_pcm(&self.playback_device, Direction::Playback, format)?;
        Ok(Box::new(AlsaPlayback {
            device: self.playback_device.clone(),
            frame_bytes: format.frame_bytes(),
            pending: Vec::new(),
            pcm: Some(pcm),
        }))
    }
}

fn open_pcm(device: &str, direction: Direction, format: &AudioFormat) -> Result<PCM, AudioError> {
    let pcm_direction = match direction {
        Direction::Capture => PcmDirection::Capture,
        Direction::Playback => PcmDirection::Playback,
    };
    let pcm = PCM::new(device, pcm_direction, false)
        .map_err(|e| AudioError::access(direction, device, e))?;

    // Unsupported hardware parameters mean the line itself is unavailable
    let unavailable = |e: alsa::Error| AudioError::unavailable(direction, device, e);
    {
        let hwp = HwParams::any(&pcm).map_err(unavailable)?;
        hwp.set_access(Access::RWInterleaved).map_err(unavailable)?;
        hwp.set_format(Format::S16LE).map_err(unavailable)?;
        hwp.set_channels(format.channels).map_err(unavailable)?;
        hwp.set_rate(format.sample_rate, ValueOr::Nearest)
            .map_err(unavailable)?;
        pcm.hw_params(&hwp).map_err(unavailable)?;
    }

    let period_size = pcm
        .hw_params_current()
        .and_then(|hwp| hwp.get_period_size())
        .unwrap_or_default();

    log::info!(
        "ALSA {}: device={}, rate={}, channels={}, period_size={}",
        direction,
        device,
        format.sample_rate,
        format.channels,
        period_size,
    );

    Ok(pcm)
}

pub struct AlsaCapture {
    device: String,
    frame_bytes: usize,
    pcm: Option<PCM>,
}

impl CaptureLine for AlsaCapture {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| AudioError::access(Direction::Capture, &self.device, "line closed"))?;

        let usable = buf.len() - buf.len() % self.frame_bytes;
        match pcm.io_bytes().readi(&mut buf[..usable]) {
            Ok(frames) => Ok(frames * self.frame_bytes),
            Err(e) => {
                // An overrun is recoverable and yields an empty read
                log::warn!("ALSA capture error: {}, recovering...", e);
                pcm.try_recover(e, true)
                    .map(|()| 0)
                    .map_err(|e2| AudioError::access(Direction::Capture, &self.device, e2))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(pcm) = &self.pcm {
            if let Err(e) = pcm.drop() {
                log::warn!("Failed to stop capture device {}: {}", self.device, e);
            }
        }
    }

    fn close(&mut self) {
        if self.pcm.take().is_some() {
            log::info!("Capture device {} closed", self.device);
        }
    }
}

/// Prefix `data` with the bytes left over from the previous write and return
/// the whole frames. The remainder that does not fill a frame is kept in
/// `pending` for the next call.
fn take_whole_frames<'a>(
    pending: &mut Vec<u8>,
    data: &'a [u8],
    frame_bytes: usize,
) -> Cow<'a, [u8]> {
    if pending.is_empty() {
        let whole = data.len() - data.len() % frame_bytes;
        pending.extend_from_slice(&data[whole..]);
        return Cow::Borrowed(&data[..whole]);
    }

    let mut joined = std::mem::take(pending);
    joined.extend_from_slice(data);
    let whole = joined.len() - joined.len() % frame_bytes;
    pending.extend_from_slice(&joined[whole..]);
    joined.truncate(whole);
    Cow::Owned(joined)
}

pub struct AlsaPlayback {
    device: String,
    frame_bytes: usize,
    /// Tail of the last payload that did not fill a frame.
    pending: Vec<u8>,
    pcm: Option<PCM>,
}

impl PlaybackLine for AlsaPlayback {
    fn write(&mut self, data: &[u8]) -> Result<usize, AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or_else(|| AudioError::access(Direction::Playback, &self.device, "line closed"))?;

        let frames = take_whole_frames(&mut self.pending, data, self.frame_bytes);
        if !self.pending.is_empty() {
            log::debug!("Holding {} bytes until the frame is complete", self.pending.len());
        }

        // Loop over short writes and recover from underruns without losing frames
        let io = pcm.io_bytes();
        let mut offset = 0;
        let mut retry_count = 0u32;
        while offset < frames.len() {
            match io.writei(&frames[offset..]) {
                Ok(written) => {
                    offset += written * self.frame_bytes;
                    retry_count = 0;
                }
                Err(e) => {
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    retry_count += 1;
                    if retry_count > MAX_RECOVERY_RETRIES {
                        return Err(AudioError::access(Direction::Playback, &self.device, e));
                    }
                    pcm.try_recover(e, true)
                        .map_err(|e2| AudioError::access(Direction::Playback, &self.device, e2))?;
                }
            }
        }
        // The held-back tail counts as accepted
        Ok(data.len())
    }

    fn drain(&mut self) -> Result<(), AudioError> {
        if !self.pending.is_empty() {
            log::warn!(
                "Dropping {} trailing bytes that do not fill a frame",
                self.pending.len()
            );
            self.pending.clear();
        }
        match &self.pcm {
            Some(pcm) => pcm
                .drain()
                .map_err(|e| AudioError::access(Direction::Playback, &self.device, e)),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        if let Some(pcm) = &self.pcm {
            if let Err(e) = pcm.drop() {
                log::warn!("Failed to stop playback device {}: {}", self.device, e);
            }
        }
    }

    fn close(&mut self) {
        if self.pcm.take().is_some() {
            log::info!("Playback device {} closed", self.device);
        }
    }
}
