//! asrwire client library entry.
//!
//! Wires the config layer, WebSocket transport and per-attempt recognition
//! sessions into a small async API. Consumed by the `asrwire` binary and by
//! integration tests.

pub mod client;
pub mod config;
pub mod obs;
pub mod session;
pub mod transport;

pub use client::{RecognitionClient, RecognitionHandle};
pub use config::ClientConfig;
pub use session::{Completion, RecognitionSession, SessionMode, SessionState, Transcript};
