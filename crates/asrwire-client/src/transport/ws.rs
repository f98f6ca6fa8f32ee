//! WebSocket transport over tokio-tungstenite.
//!
//! One socket per recognition attempt, authenticated with a bearer header.
//! Handshake rejections with 401/403 surface as `AuthRejected` so callers can
//! tell a bad key apart from a network fault.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use asrwire_core::error::{RecognitionError, Result};

use crate::config::Credential;
use crate::transport::codec::{classify, Inbound};
use crate::transport::{Connector, FrameTransport};

type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Install the process-wide TLS crypto provider used by `wss://` endpoints.
///
/// Safe to call more than once.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("crypto provider already installed");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str, credential: &Credential) -> Result<WsTransport> {
        WsTransport::connect(url, credential).await
    }
}

pub struct WsTransport {
    stream: Stream,
    closed: bool,
}

impl WsTransport {
    pub async fn connect(url: &str, credential: &Credential) -> Result<Self> {
        let mut request = url
            .into_client_request()
            .map_err(|e| RecognitionError::Config(format!("invalid endpoint url: {e}")))?;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| RecognitionError::Config("api key is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        match connect_async(request).await {
            Ok((stream, response)) => {
                info!(status = %response.status(), "websocket connected");
                Ok(Self {
                    stream,
                    closed: false,
                })
            }
            Err(e) => Err(map_handshake_error(e)),
        }
    }
}

fn map_handshake_error(err: WsError) -> RecognitionError {
    match err {
        WsError::Http(response) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                RecognitionError::AuthRejected(format!("endpoint answered {status}"))
            } else {
                RecognitionError::Connection(format!("handshake rejected with {status}"))
            }
        }
        other => RecognitionError::Connection(other.to_string()),
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
        self.stream
            .send(Message::Binary(frame.to_vec()))
            .await
            .map_err(|e| RecognitionError::Connection(format!("send failed: {e}")))
    }

    async fn recv_frame(&mut self) -> Result<Option<Bytes>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.closed = true;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Err(RecognitionError::Connection(format!("receive failed: {e}")));
                }
            };

            match classify(msg) {
                Inbound::Frame(bytes) => return Ok(Some(bytes)),
                Inbound::Text(text) => debug!(len = text.len(), "ignoring text message"),
                Inbound::Ping(payload) => trace!(len = payload.len(), "ping"),
                Inbound::Pong => trace!("pong"),
                Inbound::Close(reason) => {
                    info!(reason = reason.as_deref().unwrap_or(""), "server closed connection");
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => {}
                other => warn!(error = %other, "close failed"),
            }
        }
        self.closed = true;
    }
}
