//! WebSocket backend tests against a local server.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use live_audio::audio::AudioFormat;
use live_audio::audio::mock::{LineCall, MockHost, RecordingPlayback, ScriptedCapture};
use live_audio::{AudioChunk, Config, Conversation, LiveBackend, NetLink, RequestQueue};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Message;

fn config_for(port: u16, connect_retries: u32) -> Config {
    let mut config = Config::new().unwrap();
    config.ws_url = Box::leak(format!("ws://127.0.0.1:{}/", port).into_boxed_str());
    config.ws_token = "test-token";
    config.sample_rate = 16000;
    config.channels = 1;
    config.connect_retries = connect_retries;
    config
}

async fn accept_one(listener: TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

fn assert_hello(text: &str) {
    let hello: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(hello["type"], "hello");
    assert_eq!(hello["transport"], "websocket");
    assert_eq!(hello["audio_params"]["format"], "pcm");
    assert_eq!(hello["audio_params"]["sample_rate"], 16000);
    assert_eq!(hello["audio_params"]["channels"], 1);
}

#[test]
fn test_server_audio_is_played_and_hangup_ends_conversation() {
    let runtime = Runtime::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = runtime.spawn(async move {
        let mut ws = accept_one(listener).await;
        let hello = match ws.next().await {
            Some(Ok(Message::Text(text))) => text.to_string(),
            other => panic!("expected hello, got {:?}", other),
        };

        let mut chunks = 0;
        while chunks < 3 {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => {
                    assert_eq!(data.len(), 320);
                    chunks += 1;
                }
                Some(Ok(_)) => {}
                other => panic!("expected audio, got {:?}", other),
            }
        }

        ws.send(Message::Text(r#"{"type":"tts","text":"hi"}"#.to_string().into()))
            .await
            .unwrap();
        ws.send(Message::Binary(vec![0u8; 100].into())).await.unwrap();
        ws.close(None).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}
        (hello, chunks)
    });

    let capture = ScriptedCapture::from_sizes(&[320, 320, 320]);
    let capture_calls = capture.calls();
    let playback = RecordingPlayback::new();
    let written = playback.written();
    let host = Arc::new(MockHost::new().with_capture(capture).with_playback(playback));

    let conversation = Conversation::new(host, AudioFormat::SPEECH);
    let flags = conversation.stop_handle();
    let config = config_for(port, 0);
    let mut link = NetLink::new(&config, runtime.handle().clone(), shutdown_rx);

    let report = conversation.run(&mut link).unwrap();
    let (hello, chunks) = runtime.block_on(server).unwrap();

    assert_hello(&hello);
    assert_eq!(chunks, 3);
    assert_eq!(*written.lock().unwrap(), vec![vec![0u8; 100]]);
    let stats = report.playback.unwrap();
    assert_eq!(stats.units, 2);
    assert_eq!(stats.text_parts, 1);
    assert_eq!(stats.writes, 1);

    assert!(report.capture_joined);
    assert!(flags.is_ended());
    let calls = capture_calls.lock().unwrap();
    assert_eq!(calls[calls.len() - 2..], [LineCall::Stop, LineCall::Close]);
}

#[test]
fn test_closing_request_queue_sends_close_frame() {
    let runtime = Runtime::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = runtime.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = runtime.spawn(async move {
        let mut ws = accept_one(listener).await;
        let mut seen = Vec::new();
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(_)) => seen.push("text".to_string()),
                Ok(Message::Binary(data)) => seen.push(format!("binary:{}", data.len())),
                Ok(Message::Close(_)) => {
                    seen.push("close".to_string());
                    break;
                }
                Ok(_) => {}
                Err(e) => panic!("server read failed: {}", e),
            }
        }
        seen
    });

    let config = config_for(port, 0);
    let mut link = NetLink::new(&config, runtime.handle().clone(), shutdown_rx);
    let session = link.create_session("tester").unwrap();
    let (queue, requests) = RequestQueue::channel(8);
    let mut inbound = link.run_live(&session, requests).unwrap();

    queue.push(AudioChunk::pcm(&[1, 2, 3, 4])).unwrap();
    // Empty chunks never reach the wire
    queue.push(AudioChunk::pcm(&[])).unwrap();
    queue.push(AudioChunk::pcm(&[5, 6, 7, 8, 9, 10])).unwrap();
    assert!(queue.close());

    let seen = runtime.block_on(server).unwrap();
    assert_eq!(seen, vec!["text", "binary:4", "binary:6", "close"]);
    assert!(inbound.next().is_none());
}

#[test]
fn test_unreachable_server_ends_conversation() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let runtime = Runtime::new().unwrap();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let capture = ScriptedCapture::new(Vec::new());
    let capture_calls = capture.calls();
    let playback = RecordingPlayback::new();
    let playback_calls = playback.calls();
    let host = Arc::new(MockHost::new().with_capture(capture).with_playback(playback));

    let conversation = Conversation::new(host, AudioFormat::SPEECH);
    let flags = conversation.stop_handle();
    let config = config_for(port, 1);
    let mut link = NetLink::new(&config, runtime.handle().clone(), shutdown_rx);

    let report = conversation.run(&mut link).unwrap();

    assert_eq!(report.playback.unwrap().units, 0);
    assert!(report.capture_joined);
    assert!(flags.is_ended());
    assert!(!flags.is_running());
    assert_eq!(
        *playback_calls.lock().unwrap(),
        vec![LineCall::Drain, LineCall::Stop, LineCall::Close]
    );
    let calls = capture_calls.lock().unwrap();
    assert_eq!(calls[calls.len() - 2..], [LineCall::Stop, LineCall::Close]);
}
