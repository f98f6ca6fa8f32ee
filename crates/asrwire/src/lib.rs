//! Top-level facade crate for asrwire.
//!
//! Re-exports the protocol core and the recognition client so users can depend
//! on a single crate.

pub mod core {
    pub use asrwire_core::*;
}

pub mod client {
    pub use asrwire_client::*;
}

pub use asrwire_client::{
    Completion, RecognitionClient, RecognitionHandle, SessionMode, Transcript,
};
pub use asrwire_core::{RecognitionError, Result};
