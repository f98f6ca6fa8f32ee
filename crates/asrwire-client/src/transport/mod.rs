//! Transport layer.
//!
//! The session only needs to push encoded frames and pull raw binary frames,
//! so the socket is hidden behind [`FrameTransport`]. [`Connector`] opens one
//! per recognition attempt. Tests plug in scripted implementations.

pub mod codec;
pub mod ws;

use async_trait::async_trait;
use bytes::Bytes;

use asrwire_core::error::Result;

use crate::config::Credential;

pub use ws::{WsConnector, WsTransport};

/// A connected, frame-oriented duplex channel to the recognizer.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send one encoded frame as a binary message.
    async fn send_frame(&mut self, frame: Bytes) -> Result<()>;

    /// Next inbound binary frame. `Ok(None)` once the peer has closed.
    ///
    /// Non-binary traffic (text, ping, pong) is consumed internally.
    async fn recv_frame(&mut self) -> Result<Option<Bytes>>;

    /// Best-effort close. Never fails.
    async fn close(&mut self);
}

/// Opens authenticated transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: FrameTransport + 'static;

    async fn connect(&self, url: &str, credential: &Credential) -> Result<Self::Transport>;
}
