use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use url::Url;

use super::{LiveBackend, Session, ShutdownSignal, shutdown_requested};
use crate::audio::AudioFormat;
use crate::config::Config;
use crate::content::ContentUnit;
use crate::protocol::{HelloMessage, ServerMessage};
use crate::queue::{InboundSender, InboundStream, RequestReceiver};

const INBOUND_CAPACITY: usize = 100;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket link to a remote conversational backend.
///
/// Captured chunks go out as binary frames. Binary frames coming back are
/// played as `audio/pcm`; JSON text messages carrying `text` become text
/// units. Closing the request queue sends a close frame.
#[derive(Clone)]
pub struct NetLink {
    handle: Handle,
    shutdown: ShutdownSignal,
    ws_url: String,
    ws_token: String,
    app_name: String,
    connect_retries: u32,
    format: AudioFormat,
}

impl NetLink {
    pub fn new(config: &Config, handle: Handle, shutdown: ShutdownSignal) -> Self {
        Self {
            handle,
            shutdown,
            ws_url: config.ws_url.to_string(),
            ws_token: config.ws_token.to_string(),
            app_name: config.app_name.to_string(),
            connect_retries: config.connect_retries,
            format: config.audio_format(),
        }
    }

    async fn run(self, session: Session, mut requests: RequestReceiver, inbound: InboundSender) {
        let mut shutdown = self.shutdown.clone();
        let ws = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => return,
            ws = self.connect_with_retry(&session) => ws,
        };
        let ws = match ws {
            Ok(ws) => ws,
            Err(e) => {
                log::error!("Giving up on {}: {}", self.ws_url, e);
                return;
            }
        };

        if let Err(e) = self.stream(ws, &session, &mut requests, &inbound, &mut shutdown).await {
            log::error!("Connection error: {}", e);
        }
        // Dropping `inbound` here ends the playback loop
    }

    // 连接失败时指数退避重试
    async fn connect_with_retry(&self, session: &Session) -> anyhow::Result<WsStream> {
        let mut retry_delay = 1;
        let mut attempt = 0;
        loop {
            match self.connect(session).await {
                Ok(ws) => return Ok(ws),
                Err(e) if attempt < self.connect_retries => {
                    attempt += 1;
                    log::warn!("Connection error: {}. Retrying in {}s...", e, retry_delay);
                    tokio::time::sleep(tokio::time::Duration::from_secs(retry_delay)).await;
                    retry_delay = std::cmp::min(retry_delay * 2, 60);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect(&self, session: &Session) -> anyhow::Result<WsStream> {
        let url = Url::parse(&self.ws_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("No host in {}", self.ws_url))?;

        let request = tokio_tungstenite::tungstenite::http::Request::builder()
            .method("GET")
            .uri(self.ws_url.as_str())
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header(
                "Sec-WebSocket-Key",
                tokio_tungstenite::tungstenite::handshake::client::generate_key(),
            )
            .header("Authorization", format!("Bearer {}", self.ws_token))
            .header("Session-Id", session.id.to_string())
            .header("Protocol-Version", "1")
            .body(())?;

        log::info!("Connecting to {}...", self.ws_url);
        let (ws, _) = connect_async(request).await?;
        log::info!("Connected!");
        Ok(ws)
    }

    async fn stream(
        &self,
        ws: WsStream,
        session: &Session,
        requests: &mut RequestReceiver,
        inbound: &InboundSender,
        shutdown: &mut ShutdownSignal,
    ) -> anyhow::Result<()> {
        let (mut write, mut read) = ws.split();

        let session_id = session.id.to_string();
        let hello = HelloMessage::new(&session_id, &session.user_id, &self.format);
        let hello_json = serde_json::to_string(&hello)?;
        log::info!("Sending Hello: {}", hello_json);
        write.send(Message::Text(hello_json.into())).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    let unit = match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(msg) => {
                                    log::debug!(
                                        "Server message type={} state={:?} session={:?}",
                                        msg.msg_type,
                                        msg.state,
                                        msg.session_id
                                    );
                                    msg.into_unit()
                                }
                                Err(_) => {
                                    log::debug!("Ignoring non-JSON text: {}", text);
                                    None
                                }
                            }
                        }
                        Some(Ok(Message::Binary(data))) => Some(ContentUnit::audio(data)),
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("Server closed connection: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => None,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    };
                    if let Some(unit) = unit {
                        if inbound.send(unit).await.is_err() {
                            // Playback is gone, nobody is listening
                            write.send(Message::Close(None)).await?;
                            return Ok(());
                        }
                    }
                }
                chunk = requests.recv() => {
                    match chunk {
                        Some(chunk) if chunk.is_empty() => {}
                        Some(chunk) => {
                            write.send(Message::Binary(chunk.into_data())).await?;
                        }
                        None => {
                            log::info!("Request queue closed, closing connection");
                            write.send(Message::Close(None)).await?;
                            return Ok(());
                        }
                    }
                }
                _ = shutdown_requested(shutdown) => {
                    log::info!("Shutdown requested, closing connection");
                    write.send(Message::Close(None)).await?;
                    return Ok(());
                }
            }
        }
    }
}

impl LiveBackend for NetLink {
    fn create_session(&mut self, user_id: &str) -> anyhow::Result<Session> {
        Ok(Session::new(user_id, self.app_name.clone()))
    }

    fn run_live(
        &mut self,
        session: &Session,
        requests: RequestReceiver,
    ) -> anyhow::Result<InboundStream> {
        let (tx, stream) = InboundStream::channel(INBOUND_CAPACITY);
        self.handle
            .spawn(self.clone().run(session.clone(), requests, tx));
        Ok(stream)
    }
}
