//! Runs one live conversation: capture on its own thread, playback on the
//! calling thread, then an ordered shutdown.

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;

use crate::audio::{
    AudioFormat, AudioHost, CaptureProducer, CaptureStats, DEFAULT_BLOCK_SIZE, PlaybackConsumer,
    PlaybackStats,
};
use crate::backend::{LiveBackend, Session};
use crate::config::Config;
use crate::lifecycle::LifecycleFlags;
use crate::queue::RequestQueue;

const DEFAULT_QUEUE_CAPACITY: usize = 64;
const DEFAULT_CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// What happened during a finished conversation.
#[derive(Debug)]
pub struct ConversationReport {
    pub session: Session,
    /// `None` if the speaker could not be used or failed mid-stream.
    pub playback: Option<PlaybackStats>,
    /// `None` if the microphone failed or the capture thread was not joined.
    pub capture: Option<CaptureStats>,
    /// Whether the capture thread finished within the join timeout.
    pub capture_joined: bool,
}

/// Clears the running flag, then closes the queue. Runs on drop so the
/// order holds on every return path out of playback.
struct ShutdownGuard<'a> {
    flags: &'a LifecycleFlags,
    queue: &'a RequestQueue,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.flags.stop();
        self.queue.close();
    }
}

pub struct Conversation {
    host: Arc<dyn AudioHost>,
    format: AudioFormat,
    block_size: usize,
    queue_capacity: usize,
    capture_join_timeout: Duration,
    user_id: String,
    flags: Arc<LifecycleFlags>,
}

impl Conversation {
    pub fn new(host: Arc<dyn AudioHost>, format: AudioFormat) -> Self {
        Self {
            host,
            format,
            block_size: DEFAULT_BLOCK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            capture_join_timeout: DEFAULT_CAPTURE_JOIN_TIMEOUT,
            user_id: "local-user".to_string(),
            flags: Arc::new(LifecycleFlags::new()),
        }
    }

    pub fn from_config(config: &Config, host: Arc<dyn AudioHost>) -> Self {
        Self::new(host, config.audio_format())
            .with_block_size(config.block_size)
            .with_queue_capacity(config.queue_capacity)
            .with_capture_join_timeout(config.capture_join_timeout())
            .with_user_id(config.user_id)
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_capture_join_timeout(mut self, timeout: Duration) -> Self {
        self.capture_join_timeout = timeout;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Flags of this conversation. Calling `stop()` on them from another
    /// thread ends playback before the next unit.
    pub fn stop_handle(&self) -> Arc<LifecycleFlags> {
        self.flags.clone()
    }

    /// Run the conversation to completion on the calling thread.
    ///
    /// Only setup failures are returned as errors. Device failures end the
    /// conversation and are logged; the report shows which side stopped.
    pub fn run<B: LiveBackend>(self, backend: &mut B) -> anyhow::Result<ConversationReport> {
        let session = backend
            .create_session(&self.user_id)
            .context("Failed to create session")?;
        log::info!("Session {} created for {}", session.id, session.user_id);

        let (queue, requests) = RequestQueue::channel(self.queue_capacity);
        let queue = Arc::new(queue);
        let inbound = backend
            .run_live(&session, requests)
            .context("Failed to start live streaming")?;

        let (done_tx, done_rx) = std_mpsc::channel();
        let capture_handle = {
            let host = self.host.clone();
            let queue = queue.clone();
            let flags = self.flags.clone();
            let producer = CaptureProducer::new(self.format, self.block_size);
            thread::Builder::new()
                .name(format!("mic-stream-{}", session.id))
                .spawn(move || {
                    let stats = match producer.run(host.as_ref(), &queue, &flags) {
                        Ok(stats) => Some(stats),
                        Err(e) => {
                            log::error!("Error accessing microphone: {}", e);
                            None
                        }
                    };
                    let _ = done_tx.send(());
                    stats
                })
        };
        let capture_handle = match capture_handle {
            Ok(handle) => handle,
            Err(e) => {
                self.flags.stop();
                queue.close();
                return Err(e).context("Failed to spawn capture thread");
            }
        };

        let playback = {
            let _shutdown = ShutdownGuard {
                flags: &self.flags,
                queue: &queue,
            };
            PlaybackConsumer::new(self.format).run(self.host.as_ref(), inbound, &self.flags)
        };
        let playback = match playback {
            Ok(stats) => Some(stats),
            Err(e) => {
                log::error!("Error accessing speaker: {}", e);
                None
            }
        };

        let (capture, capture_joined) =
            await_capture(capture_handle, done_rx, self.capture_join_timeout);

        log::info!("Conversation {} ended", session.id);
        Ok(ConversationReport {
            session,
            playback,
            capture,
            capture_joined,
        })
    }
}

/// Wait for the capture thread to finish, up to `timeout`.
fn await_capture(
    handle: JoinHandle<Option<CaptureStats>>,
    done: std_mpsc::Receiver<()>,
    timeout: Duration,
) -> (Option<CaptureStats>, bool) {
    match done.recv_timeout(timeout) {
        // Disconnected means the thread is gone without signalling, i.e. it panicked
        Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
            Ok(stats) => (stats, true),
            Err(_) => {
                log::error!("Capture thread panicked");
                (None, true)
            }
        },
        Err(std_mpsc::RecvTimeoutError::Timeout) => {
            log::warn!(
                "Capture thread still blocked after {:?}, detaching it",
                timeout
            );
            (None, false)
        }
    }
}
