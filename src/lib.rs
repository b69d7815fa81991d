//! Full-duplex audio for a live conversational backend.
//!
//! A capture thread streams microphone blocks into a [`RequestQueue`] while
//! the calling thread plays the audio parts of the backend's output. A
//! [`Conversation`] wires both to a [`LiveBackend`] and shuts them down in
//! order.

pub mod audio;
pub mod backend;
pub mod config;
pub mod content;
pub mod conversation;
pub mod lifecycle;
pub mod protocol;
pub mod queue;

pub use backend::{EchoBackend, LiveBackend, NetLink, Session, ShutdownSignal};
pub use config::{BackendKind, Config};
pub use content::{AudioChunk, ContentUnit, Part};
pub use conversation::{Conversation, ConversationReport};
pub use lifecycle::LifecycleFlags;
pub use queue::{InboundStream, QueueError, RequestQueue, RequestReceiver};
