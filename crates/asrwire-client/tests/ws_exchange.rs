#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

//! End-to-end exchanges against an in-process recognizer stub.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

use asrwire_client::config::{ClientConfig, Credential};
use asrwire_client::{Completion, RecognitionClient, SessionMode};
use asrwire_core::error::{ErrorKind, RecognitionError};
use asrwire_core::protocol::frame::{decode_frame, Compression, Flags, Frame, MessageKind, Serialization};
use asrwire_core::protocol::payload::{self, PayloadValue};

const API_KEY: &str = "sk-test";
const PCM: &[u8] = b"0123456789abcdef0123456789abcdef";

#[derive(Clone, Copy)]
enum Script {
    Transcribe,
    SequenceMismatch,
    WakeThenHold,
    PartialThenHold,
    PartialThenClose,
    Reject,
    Unauthorized,
}

async fn serve(script: Script) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(handle(stream, script));
        }
    });

    (addr, accepted)
}

async fn handle(stream: TcpStream, script: Script) {
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let bearer = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let status = match script {
            Script::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            Script::Reject => Some(StatusCode::FORBIDDEN),
            _ if bearer.as_deref() != Some("Bearer sk-test") => Some(StatusCode::FORBIDDEN),
            _ => None,
        };
        if let Some(status) = status {
            let mut rejection = ErrorResponse::new(Some(status.to_string()));
            *rejection.status_mut() = status;
            return Err(rejection);
        }
        Ok(resp)
    };
    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    let config = next_frame(&mut ws).await;
    assert_eq!(config.kind, MessageKind::ClientConfig);
    assert_eq!(config.sequence, Some(1));

    if matches!(script, Script::SequenceMismatch) {
        send(&mut ws, error_frame(45_000_000, "mismatch sequence")).await;
        hold(&mut ws).await;
        return;
    }
    send(&mut ws, ack_frame()).await;

    let audio = next_frame(&mut ws).await;
    assert_eq!(audio.kind, MessageKind::ClientAudio);
    assert_eq!(audio.flags.bits(), 0b0011);
    assert_eq!(audio.sequence, Some(-2));
    let pcm = payload::unwrap(&audio.payload, Compression::Gzip, Serialization::None);
    assert_eq!(pcm.value, PayloadValue::Text(String::from_utf8_lossy(PCM).into_owned()));

    match script {
        Script::Transcribe => {
            send(&mut ws, full_frame(2, json!({"result": {"text": "从张江"}}), false)).await;
            send(&mut ws, full_frame(3, json!({"result": {"text": ""}}), false)).await;
            send(
                &mut ws,
                full_frame(-4, json!({"data": {"result": {"text": "从张江人工智能岛到虹桥火车站"}}}), true),
            )
            .await;
            hold(&mut ws).await;
        }
        Script::WakeThenHold => {
            send(&mut ws, full_frame(2, json!({"result": {"text": "HI, 任意门"}}), false)).await;
            hold(&mut ws).await;
        }
        Script::PartialThenHold => {
            send(&mut ws, full_frame(2, json!({"result": {"text": "到虹桥"}}), false)).await;
            hold(&mut ws).await;
        }
        Script::PartialThenClose => {
            send(&mut ws, full_frame(2, json!({"result": {"text": "到虹桥"}}), false)).await;
            let _ = ws.close(None).await;
        }
        Script::SequenceMismatch | Script::Reject | Script::Unauthorized => {}
    }
}

async fn next_frame(ws: &mut WebSocketStream<TcpStream>) -> Frame {
    loop {
        match ws.next().await {
            Some(Ok(Message::Binary(b))) => return decode_frame(Bytes::from(b)).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("client went away: {other:?}"),
        }
    }
}

async fn send(ws: &mut WebSocketStream<TcpStream>, frame: Frame) {
    ws.send(Message::Binary(frame.encode().to_vec())).await.unwrap();
}

/// Keep the socket open until the client leaves.
async fn hold(ws: &mut WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn json_payload(v: Value) -> Bytes {
    payload::wrap_json(&v, Compression::Gzip).unwrap()
}

fn ack_frame() -> Frame {
    Frame::server_ack(Flags::POS_SEQUENCE, Some(1), 1, json_payload(json!({})))
}

fn full_frame(sequence: i32, body: Value, last: bool) -> Frame {
    let flags = if last { Flags::LAST_PACKAGE } else { Flags::NONE };
    Frame::new(MessageKind::ServerFull, flags, Some(sequence), json_payload(body))
}

fn error_frame(code: u32, message: &str) -> Frame {
    Frame::server_error(code, json_payload(json!({"error": message})))
}

fn client(addr: SocketAddr, command_ms: u64, wake_ms: u64) -> RecognitionClient {
    let mut cfg = ClientConfig::default();
    cfg.endpoint.base_ws = format!("ws://{addr}/v1");
    cfg.endpoint.api_key = Some(Credential::new(API_KEY));
    cfg.timeouts.connect_ms = 2000;
    cfg.timeouts.config_ack_ms = 2000;
    cfg.timeouts.command_ms = command_ms;
    cfg.timeouts.wake_ms = wake_ms;
    RecognitionClient::new(cfg).unwrap()
}

#[tokio::test]
async fn transcribes_fragments_until_last_package() {
    let (addr, _) = serve(Script::Transcribe).await;
    let client = client(addr, 3000, 1000);

    let transcript = client.recognize(PCM).await.unwrap();
    assert_eq!(transcript.text.as_deref(), Some("从张江人工智能岛到虹桥火车站"));
    assert_eq!(transcript.completion, Completion::FinalPackage);
    assert_eq!(transcript.fragments, 2);

    let metrics = client.metrics();
    assert_eq!(
        metrics
            .sessions
            .get(&[("mode", "command"), ("outcome", "final_package")]),
        1
    );
    assert_eq!(metrics.frames_received.get(&[("kind", "server_ack")]), 1);
    assert_eq!(metrics.frames_received.get(&[("kind", "server_full")]), 3);
}

#[tokio::test]
async fn recognize_text_returns_plain_string() {
    let (addr, _) = serve(Script::Transcribe).await;
    let text = client(addr, 3000, 1000).recognize_text(PCM).await.unwrap();
    assert_eq!(text.as_deref(), Some("从张江人工智能岛到虹桥火车站"));
}

#[tokio::test]
async fn empty_audio_is_rejected_before_connecting() {
    let (addr, accepted) = serve(Script::Transcribe).await;
    let err = client(addr, 3000, 1000).recognize(&[]).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyAudio);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn sequence_mismatch_surfaces_server_code() {
    let (addr, _) = serve(Script::SequenceMismatch).await;
    let err = client(addr, 3000, 1000).recognize(PCM).await.unwrap_err();

    assert!(err.is_sequence_mismatch());
    match err {
        RecognitionError::Protocol { code, message } => {
            assert_eq!(code, 45_000_000);
            assert_eq!(message, "mismatch sequence");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn wake_word_short_circuits_before_budget() {
    let (addr, _) = serve(Script::WakeThenHold).await;
    let client = client(addr, 5000, 4000);

    let started = Instant::now();
    assert!(client.detect_wake_word(PCM).await.unwrap());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn wake_word_absent_is_false() {
    let (addr, _) = serve(Script::PartialThenClose).await;
    assert!(!client(addr, 3000, 1000).detect_wake_word(PCM).await.unwrap());
}

#[tokio::test]
async fn timeout_returns_partial_transcript() {
    let (addr, _) = serve(Script::PartialThenHold).await;
    let transcript = client(addr, 300, 200).recognize(PCM).await.unwrap();

    assert_eq!(transcript.completion, Completion::TimedOut);
    assert_eq!(transcript.text.as_deref(), Some("到虹桥"));
}

#[tokio::test]
async fn server_close_keeps_partial_transcript() {
    let (addr, _) = serve(Script::PartialThenClose).await;
    let transcript = client(addr, 3000, 1000).recognize(PCM).await.unwrap();

    assert_eq!(transcript.completion, Completion::ConnectionClosed);
    assert_eq!(transcript.text.as_deref(), Some("到虹桥"));
}

#[tokio::test]
async fn forbidden_handshake_is_auth_rejected() {
    let (addr, _) = serve(Script::Reject).await;
    let err = client(addr, 3000, 1000).recognize(PCM).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRejected);
    assert_eq!(err.kind().as_str(), "AUTH_REJECTED");
}

#[tokio::test]
async fn unauthorized_handshake_is_auth_rejected() {
    let (addr, accepted) = serve(Script::Unauthorized).await;
    let client = client(addr, 3000, 1000);
    let err = client.recognize(PCM).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AuthRejected);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(client.metrics().frames_sent.get(&[("kind", "client_config")]), 0);
}

#[tokio::test]
async fn unreachable_endpoint_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, 3000, 1000).recognize(PCM).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn spawned_session_can_be_cancelled() {
    let (addr, _) = serve(Script::PartialThenHold).await;
    let client = client(addr, 10000, 5000);

    let handle = client.spawn_recognize(PCM.to_vec(), SessionMode::Command);
    let canceller = handle.cancel_handle();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!handle.is_finished());
    assert!(!canceller.is_cancelled());

    canceller.cancel();
    assert!(canceller.is_cancelled());
    handle.cancel();

    let transcript = handle.join().await.unwrap();
    assert_eq!(transcript.completion, Completion::Cancelled);
    assert_eq!(transcript.text.as_deref(), Some("到虹桥"));
}

#[tokio::test]
async fn missing_credential_is_a_config_error() {
    let (addr, accepted) = serve(Script::Transcribe).await;
    let mut cfg = ClientConfig::default();
    cfg.endpoint.base_ws = format!("ws://{addr}/v1");
    let client = RecognitionClient::new(cfg).unwrap();

    let err = client.recognize(PCM).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(accepted.load(Ordering::SeqCst), 0);
}
