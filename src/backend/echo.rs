use tokio::runtime::Handle;

use super::{LiveBackend, Session, ShutdownSignal, shutdown_requested};
use crate::content::{ContentUnit, Part};
use crate::queue::{InboundSender, InboundStream, RequestReceiver};

const INBOUND_CAPACITY: usize = 32;

/// Loopback backend: every captured chunk is played straight back.
///
/// Each chunk comes back as one unit holding a short transcript line and the
/// audio itself. Handy for checking a microphone/speaker pair without a
/// server.
pub struct EchoBackend {
    handle: Handle,
    shutdown: ShutdownSignal,
    limit: Option<usize>,
}

impl EchoBackend {
    pub fn new(handle: Handle, shutdown: ShutdownSignal) -> Self {
        Self {
            handle,
            shutdown,
            limit: None,
        }
    }

    /// End the inbound stream after echoing `limit` chunks.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl LiveBackend for EchoBackend {
    fn create_session(&mut self, user_id: &str) -> anyhow::Result<Session> {
        Ok(Session::new(user_id, "echo"))
    }

    fn run_live(
        &mut self,
        session: &Session,
        requests: RequestReceiver,
    ) -> anyhow::Result<InboundStream> {
        let (tx, stream) = InboundStream::channel(INBOUND_CAPACITY);
        let shutdown = self.shutdown.clone();
        let limit = self.limit;
        self.handle.spawn(echo_loop(requests, tx, shutdown, limit));

        log::info!("Echo backend started for session {}", session.id);
        Ok(stream)
    }
}

async fn echo_loop(
    mut requests: RequestReceiver,
    tx: InboundSender,
    mut shutdown: ShutdownSignal,
    limit: Option<usize>,
) {
    let mut echoed = 0usize;
    loop {
        if limit.is_some_and(|limit| echoed >= limit) {
            log::info!("Echo limit of {} chunks reached", echoed);
            break;
        }

        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => {
                log::info!("Echo backend shutting down");
                break;
            }
            chunk = requests.recv() => {
                let Some(chunk) = chunk else {
                    log::info!("Request queue closed, echo backend done");
                    break;
                };
                if chunk.is_empty() {
                    continue;
                }
                let unit = ContentUnit::new(vec![
                    Part::text(format!("echo: {} bytes", chunk.len())),
                    Part::from(chunk),
                ]);
                if tx.send(unit).await.is_err() {
                    break;
                }
                echoed += 1;
            }
        }
    }
}
