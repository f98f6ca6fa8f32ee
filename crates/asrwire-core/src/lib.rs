//! asrwire core: transport-agnostic protocol primitives for the streaming
//! speech-recognition client.
//!
//! This crate defines the binary wire format, payload transcoding, server event
//! interpretation, transcript accumulation and the shared error surface. It
//! carries no transport or runtime dependencies.
//!
//! # Panic policy
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `FrameError`/`RecognitionError` so a
//! malformed server frame never takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod accumulator;
pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, FrameError, Phase, RecognitionError, Result};

pub use accumulator::{ResultAccumulator, WakePhrases};
pub use protocol::event::{interpret, ServerEvent};
pub use protocol::frame::{decode_frame, encode, Compression, Flags, Frame, MessageKind, Serialization};
