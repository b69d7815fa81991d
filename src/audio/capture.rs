use crate::content::AudioChunk;
use crate::lifecycle::LifecycleFlags;
use crate::queue::RequestQueue;

use super::device::{ActiveCapture, AudioFormat, AudioHost};
use super::error::AudioError;

/// Recommended read size: 128 ms of 16 kHz mono S16LE.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Reads issued against the device, empty ones included.
    pub reads: u64,
    /// Chunks handed to the request queue.
    pub chunks: u64,
    pub bytes: u64,
}

/// Reads the microphone in fixed blocks and feeds the request queue.
#[derive(Debug, Clone)]
pub struct CaptureProducer {
    format: AudioFormat,
    block_size: usize,
}

impl CaptureProducer {
    /// `block_size` is raised to one frame if smaller, so a read can always
    /// return whole frames.
    pub fn new(format: AudioFormat, block_size: usize) -> Self {
        Self {
            format,
            block_size: block_size.max(format.frame_bytes()),
        }
    }

    /// Open the input line and capture until `flags` stops running.
    pub fn run(
        &self,
        host: &dyn AudioHost,
        queue: &RequestQueue,
        flags: &LifecycleFlags,
    ) -> Result<CaptureStats, AudioError> {
        let line = host.open_capture(&self.format)?;
        log::info!(
            "Microphone initialized ({} Hz, {} ch). Start speaking...",
            self.format.sample_rate,
            self.format.channels
        );
        self.capture_loop(ActiveCapture::new(line), queue, flags)
    }

    /// Capture from an already running line.
    ///
    /// The running flag is checked before every read, so after it clears at
    /// most one in-flight read completes. A device error ends the loop
    /// without retrying. The line is stopped and closed on every exit path.
    pub fn capture_loop(
        &self,
        mut line: ActiveCapture,
        queue: &RequestQueue,
        flags: &LifecycleFlags,
    ) -> Result<CaptureStats, AudioError> {
        let mut buffer = vec![0u8; self.block_size];
        let mut stats = CaptureStats::default();

        let result = loop {
            if !flags.is_running() {
                break Ok(());
            }

            let n = match line.read(&mut buffer) {
                Ok(n) => n.min(buffer.len()),
                Err(e) => break Err(e),
            };
            stats.reads += 1;

            if n == 0 {
                continue;
            }

            if queue.push(AudioChunk::pcm(&buffer[..n])).is_err() {
                log::warn!("Request queue closed, stopping capture");
                break Ok(());
            }
            stats.chunks += 1;
            stats.bytes += n as u64;
        };

        line.shutdown();
        log::info!(
            "Recording stopped: {} chunks, {} bytes captured",
            stats.chunks,
            stats.bytes
        );
        result.map(|()| stats)
    }
}

impl Default for CaptureProducer {
    fn default() -> Self {
        Self::new(AudioFormat::SPEECH, DEFAULT_BLOCK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::{pattern_byte, LineCall, MockHost, ReadStep, ScriptedCapture};
    use crate::queue::RequestReceiver;
    use std::sync::Arc;

    fn drain(queue: RequestQueue, mut rx: RequestReceiver) -> Vec<AudioChunk> {
        queue.close();
        std::iter::from_fn(|| rx.blocking_recv()).collect()
    }

    #[test]
    fn test_stops_after_flag_cleared() {
        let flags = Arc::new(LifecycleFlags::new());
        let line = ScriptedCapture::from_sizes(&[4096, 4096, 0, 2048]).stop_after(3, flags.clone());
        let calls = line.calls();
        let (queue, rx) = RequestQueue::channel(8);

        let stats = CaptureProducer::default()
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap();

        let chunks = drain(queue, rx);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![4096, 4096]);
        assert_eq!(stats.reads, 3);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.bytes, 8192);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LineCall::Read(4096),
                LineCall::Read(4096),
                LineCall::Read(0),
                LineCall::Stop,
                LineCall::Close
            ]
        );
    }

    #[test]
    fn test_chunk_holds_exact_read_prefix() {
        let flags = Arc::new(LifecycleFlags::new());
        let line = ScriptedCapture::from_sizes(&[10, 3]).stop_after(2, flags.clone());
        let (queue, rx) = RequestQueue::channel(8);

        CaptureProducer::new(AudioFormat::SPEECH, 16)
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap();

        let chunks = drain(queue, rx);
        assert_eq!(chunks.len(), 2);
        let expected: Vec<u8> = (0..3).map(|i| pattern_byte(1, i)).collect();
        assert_eq!(chunks[1].data().as_ref(), expected.as_slice());
        assert!(chunks.iter().all(|c| c.mime_type() == "audio/pcm"));
    }

    #[test]
    fn test_block_smaller_than_a_frame_is_raised() {
        let stereo = AudioFormat::new(16000, 2);
        let producer = CaptureProducer::new(stereo, 1);
        assert_eq!(producer.block_size, 4);

        let flags = Arc::new(LifecycleFlags::new());
        let line = ScriptedCapture::from_sizes(&[4]).stop_after(1, flags.clone());
        let (queue, rx) = RequestQueue::channel(4);
        let stats = producer
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap();

        assert_eq!(stats.chunks, 1);
        assert_eq!(drain(queue, rx)[0].len(), 4);
    }

    #[test]
    fn test_no_read_when_already_stopped() {
        let flags = LifecycleFlags::new();
        flags.stop();
        let line = ScriptedCapture::from_sizes(&[4096]);
        let calls = line.calls();
        let (queue, _rx) = RequestQueue::channel(1);

        let stats = CaptureProducer::default()
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap();

        assert_eq!(stats.reads, 0);
        assert_eq!(*calls.lock().unwrap(), vec![LineCall::Stop, LineCall::Close]);
    }

    #[test]
    fn test_device_failure_aborts_and_cleans_up() {
        let flags = LifecycleFlags::new();
        let line = ScriptedCapture::new(vec![
            ReadStep::Bytes(100),
            ReadStep::Fail("device unplugged".into()),
            ReadStep::Bytes(100),
        ]);
        let calls = line.calls();
        let (queue, rx) = RequestQueue::channel(8);

        let err = CaptureProducer::default()
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap_err();

        assert!(matches!(err, AudioError::DeviceAccess { .. }));
        assert_eq!(drain(queue, rx).len(), 1);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                LineCall::Read(100),
                LineCall::Read(0),
                LineCall::Stop,
                LineCall::Close
            ]
        );
    }

    #[test]
    fn test_closed_queue_ends_capture() {
        let flags = LifecycleFlags::new();
        let line = ScriptedCapture::from_sizes(&[64, 64, 64]);
        let calls = line.calls();
        let (queue, rx) = RequestQueue::channel(8);
        drop(rx);

        let stats = CaptureProducer::default()
            .capture_loop(ActiveCapture::new(Box::new(line)), &queue, &flags)
            .unwrap();

        assert_eq!(stats.chunks, 0);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![LineCall::Read(64), LineCall::Stop, LineCall::Close]
        );
    }

    #[test]
    fn test_unavailable_line_reports_before_loop() {
        let flags = LifecycleFlags::new();
        let (queue, _rx) = RequestQueue::channel(1);

        let err = CaptureProducer::default()
            .run(&MockHost::new(), &queue, &flags)
            .unwrap_err();

        assert!(matches!(err, AudioError::DeviceUnavailable { .. }));
    }
}
