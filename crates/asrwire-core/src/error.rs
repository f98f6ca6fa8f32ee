//! Shared error types across asrwire crates.

use thiserror::Error;

/// Server error code reported when the client's sequence numbers do not line
/// up with what the recognizer expects.
pub const SEQUENCE_MISMATCH_CODE: u32 = 45_000_000;

/// Stable error classification (for logs, metrics labels and callers that
/// want to show an actionable message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Socket or handshake failure.
    Connection,
    /// Credential rejected by the endpoint.
    AuthRejected,
    /// Malformed frame or server-reported error.
    Protocol,
    /// A phase deadline elapsed without a usable result.
    Timeout,
    /// Zero-length audio rejected before any network activity.
    EmptyAudio,
    /// Invalid or incomplete configuration.
    Config,
    /// Internal failure (encoding, task join).
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "CONNECTION",
            ErrorKind::AuthRejected => "AUTH_REJECTED",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::EmptyAudio => "EMPTY_AUDIO",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Decode failure for a single inbound frame.
///
/// Decoding never partially applies: on any of these the whole frame is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame too short: need {needed} bytes for {field}, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported header size of {0} words")]
    UnsupportedHeaderSize(u8),
    #[error("negative payload length {0}")]
    NegativeLength(i32),
    #[error("unknown serialization method {0:#06b}")]
    UnknownSerialization(u8),
    #[error("unknown compression method {0:#06b}")]
    UnknownCompression(u8),
}

impl FrameError {
    /// Stable reason label (logs, metrics, test vectors).
    pub fn code(&self) -> &'static str {
        match self {
            FrameError::Truncated { .. } => "TRUNCATED",
            FrameError::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            FrameError::UnsupportedHeaderSize(_) => "UNSUPPORTED_HEADER_SIZE",
            FrameError::NegativeLength(_) => "NEGATIVE_LENGTH",
            FrameError::UnknownSerialization(_) => "UNKNOWN_SERIALIZATION",
            FrameError::UnknownCompression(_) => "UNKNOWN_COMPRESSION",
        }
    }
}

/// Phase of a recognition exchange a timeout applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    ConfigAck,
    Exchange,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::ConfigAck => "config_ack",
            Phase::Exchange => "exchange",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, RecognitionError>;

/// Unified error type for a recognition attempt.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("credential rejected: {0}")]
    AuthRejected(String),
    #[error("malformed frame: {0}")]
    Frame(#[from] FrameError),
    #[error("server error {code}: {message}")]
    Protocol { code: u32, message: String },
    #[error("timed out during {phase}")]
    Timeout { phase: Phase },
    #[error("audio buffer is empty")]
    EmptyAudio,
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RecognitionError {
    /// Map to a stable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecognitionError::Connection(_) => ErrorKind::Connection,
            RecognitionError::AuthRejected(_) => ErrorKind::AuthRejected,
            RecognitionError::Frame(_) | RecognitionError::Protocol { .. } => ErrorKind::Protocol,
            RecognitionError::Timeout { .. } => ErrorKind::Timeout,
            RecognitionError::EmptyAudio => ErrorKind::EmptyAudio,
            RecognitionError::Config(_) => ErrorKind::Config,
            RecognitionError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Server-reported error code, if any.
    pub fn server_code(&self) -> Option<u32> {
        match self {
            RecognitionError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True when the server rejected our sequence numbering. This is a client
    /// bug, not a transient fault.
    pub fn is_sequence_mismatch(&self) -> bool {
        self.server_code() == Some(SEQUENCE_MISMATCH_CODE)
    }
}
