//! Channels between the device threads and the backend.
//!
//! Outbound: the capture thread pushes [`AudioChunk`]s into a
//! [`RequestQueue`]; the backend drains the paired [`RequestReceiver`].
//! Closing the queue is how the backend learns that input is over.
//!
//! Inbound: the backend sends [`ContentUnit`]s into an [`InboundSender`];
//! the playback loop consumes the paired [`InboundStream`] as a blocking
//! iterator that ends once every sender is gone.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::content::{AudioChunk, ContentUnit};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was closed, or the backend stopped receiving.
    #[error("request queue closed")]
    Closed,
}

/// Push side of the outbound audio channel.
pub struct RequestQueue {
    tx: Mutex<Option<mpsc::Sender<AudioChunk>>>,
}

impl RequestQueue {
    /// Create a bounded queue. A full queue blocks the pushing thread.
    pub fn channel(capacity: usize) -> (RequestQueue, RequestReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            RequestQueue {
                tx: Mutex::new(Some(tx)),
            },
            RequestReceiver { rx },
        )
    }

    /// Blocking push. Must not be called from inside an async context.
    pub fn push(&self, chunk: AudioChunk) -> Result<(), QueueError> {
        // Clone out of the lock so a push blocked on backpressure never holds up close().
        let tx = match self.tx.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let tx = tx.ok_or(QueueError::Closed)?;
        tx.blocking_send(chunk).map_err(|_| QueueError::Closed)
    }

    /// Signal end of input. Returns false if the queue was already closed.
    pub fn close(&self) -> bool {
        let sender = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        sender.is_some()
    }

    pub fn is_closed(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.as_ref().is_none_or(|tx| tx.is_closed()),
            Err(_) => true,
        }
    }
}

/// Backend side of the outbound audio channel.
pub struct RequestReceiver {
    rx: mpsc::Receiver<AudioChunk>,
}

impl RequestReceiver {
    /// Next chunk, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<AudioChunk> {
        self.rx.recv().await
    }

    pub fn blocking_recv(&mut self) -> Option<AudioChunk> {
        self.rx.blocking_recv()
    }
}

pub type InboundSender = mpsc::Sender<ContentUnit>;

/// Blocking, non-restartable stream of backend output.
pub struct InboundStream {
    rx: mpsc::Receiver<ContentUnit>,
}

impl InboundStream {
    pub fn channel(capacity: usize) -> (InboundSender, InboundStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, InboundStream { rx })
    }
}

impl Iterator for InboundStream {
    type Item = ContentUnit;

    fn next(&mut self) -> Option<ContentUnit> {
        self.rx.blocking_recv()
    }
}
