//! Conversational backends.
//!
//! A backend owns the far side of both channels: it drains the outbound
//! [`RequestReceiver`] and produces the [`InboundStream`] the speaker plays.
//! The inbound stream ends when the backend drops its sender, which happens
//! when the request queue closes, the remote side hangs up, or the shutdown
//! signal fires.

mod echo;
mod net_link;

pub use echo::EchoBackend;
pub use net_link::NetLink;

use tokio::sync::watch;
use uuid::Uuid;

use crate::queue::{InboundStream, RequestReceiver};

/// Fires once (false → true) to make a backend end its inbound stream.
pub type ShutdownSignal = watch::Receiver<bool>;

/// One conversation with a backend.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub app_name: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            app_name: app_name.into(),
        }
    }
}

pub trait LiveBackend {
    fn create_session(&mut self, user_id: &str) -> anyhow::Result<Session>;

    /// Start streaming for `session`. Chunks pushed into the paired request
    /// queue arrive on `requests`; backend output arrives on the returned stream.
    fn run_live(
        &mut self,
        session: &Session,
        requests: RequestReceiver,
    ) -> anyhow::Result<InboundStream>;
}

/// Resolves once shutdown is requested or the signal's sender is gone.
pub(crate) async fn shutdown_requested(signal: &mut ShutdownSignal) {
    while !*signal.borrow_and_update() {
        if signal.changed().await.is_err() {
            // No sender left; nobody can ask for shutdown any more
            std::future::pending::<()>().await;
        }
    }
}
