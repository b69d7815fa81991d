//! Flags shared between the capture thread and the playback loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// The only state shared across threads during a conversation.
///
/// Each flag moves one way, once: `running` true → false, `ended`
/// false → true. Stores use `SeqCst` so that clearing `running` is visible
/// before anything the coordinator does afterwards (closing the queue).
#[derive(Debug)]
pub struct LifecycleFlags {
    running: AtomicBool,
    ended: AtomicBool,
}

impl LifecycleFlags {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the running flag. Returns true if this call performed the transition.
    pub fn stop(&self) -> bool {
        self.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    pub fn mark_ended(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

impl Default for LifecycleFlags {
    fn default() -> Self {
        Self::new()
    }
}
