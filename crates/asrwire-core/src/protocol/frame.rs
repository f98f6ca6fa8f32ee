//! Binary frame codec (panic-free).
//!
//! Wire layout:
//!
//! ```text
//! byte0  version(4) | header_words(4)
//! byte1  kind(4)    | flags(4)
//! byte2  serial(4)  | compression(4)
//! byte3  reserved
//! [i32 BE sequence]          if flags bit0
//! [kind-specific fields]     ack sequence (i32) / error code (u32)
//! [u32 BE length][payload]   absent for a bare ack
//! ```
//!
//! Parsing rules:
//! - Never index (`buf[0]`); use `Buf` with `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::error::FrameError;

/// Protocol revision carried in the high nibble of byte 0.
pub const PROTOCOL_VERSION: u8 = 0b0001;
/// Header size in 4-byte words.
pub const HEADER_WORDS: u8 = 0b0001;
/// Header size in bytes.
pub const HEADER_LEN: usize = 4;
/// Sequence value asking the server to auto-assign the slot (final audio chunk).
pub const AUTO_ASSIGN_SEQUENCE: i32 = -2;

/// Message type nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full client request carrying the session descriptor.
    ClientConfig,
    /// Audio-only client request.
    ClientAudio,
    /// Full server response (transcript).
    ServerFull,
    /// Server acknowledgement.
    ServerAck,
    /// Server error response.
    ServerError,
    /// Any nibble this revision does not define.
    Unknown(u8),
}

impl MessageKind {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x0f {
            0b0001 => MessageKind::ClientConfig,
            0b0010 => MessageKind::ClientAudio,
            0b1001 => MessageKind::ServerFull,
            0b1011 => MessageKind::ServerAck,
            0b1111 => MessageKind::ServerError,
            other => MessageKind::Unknown(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            MessageKind::ClientConfig => 0b0001,
            MessageKind::ClientAudio => 0b0010,
            MessageKind::ServerFull => 0b1001,
            MessageKind::ServerAck => 0b1011,
            MessageKind::ServerError => 0b1111,
            MessageKind::Unknown(bits) => bits & 0x0f,
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::ClientConfig => "client_config",
            MessageKind::ClientAudio => "client_audio",
            MessageKind::ServerFull => "server_full",
            MessageKind::ServerAck => "server_ack",
            MessageKind::ServerError => "server_error",
            MessageKind::Unknown(_) => "unknown",
        }
    }
}

/// Message-type-specific flag nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    const SEQUENCE_BIT: u8 = 0b0001;
    const LAST_BIT: u8 = 0b0010;

    /// No sequence, more frames follow.
    pub const NONE: Flags = Flags(0b0000);
    /// Positive client-assigned sequence present.
    pub const POS_SEQUENCE: Flags = Flags(0b0001);
    /// Last package, no sequence.
    pub const LAST_PACKAGE: Flags = Flags(0b0010);
    /// Negative / auto-assigned sequence present on the last package.
    pub const NEG_SEQUENCE: Flags = Flags(0b0011);

    pub fn from_bits(bits: u8) -> Self {
        Flags(bits & 0x0f)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn has_sequence(self) -> bool {
        self.0 & Self::SEQUENCE_BIT != 0
    }

    pub fn is_last_package(self) -> bool {
        self.0 & Self::LAST_BIT != 0
    }

    fn with_sequence(self, present: bool) -> Self {
        if present {
            Flags(self.0 | Self::SEQUENCE_BIT)
        } else {
            Flags(self.0 & !Self::SEQUENCE_BIT)
        }
    }
}

/// Payload serialization nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serialization {
    None,
    #[default]
    Json,
}

impl Serialization {
    pub fn from_bits(bits: u8) -> Result<Self, FrameError> {
        match bits & 0x0f {
            0b0000 => Ok(Serialization::None),
            0b0001 => Ok(Serialization::Json),
            other => Err(FrameError::UnknownSerialization(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Serialization::None => 0b0000,
            Serialization::Json => 0b0001,
        }
    }
}

/// Payload compression nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    pub fn from_bits(bits: u8) -> Result<Self, FrameError> {
        match bits & 0x0f {
            0b0000 => Ok(Compression::None),
            0b0001 => Ok(Compression::Gzip),
            other => Err(FrameError::UnknownCompression(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Compression::None => 0b0000,
            Compression::Gzip => 0b0001,
        }
    }
}

/// One discrete binary message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: MessageKind,
    pub flags: Flags,
    pub serialization: Serialization,
    pub compression: Compression,
    /// Present iff `flags.has_sequence()`.
    pub sequence: Option<i32>,
    /// Acknowledged sequence (`ServerAck` only).
    pub ack_sequence: Option<i32>,
    /// Server error code (`ServerError` only).
    pub error_code: Option<u32>,
    /// Encoded (possibly compressed, possibly serialized) body.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame with the protocol's default JSON + gzip envelope.
    ///
    /// Flag bit0 is derived from `sequence` so the two cannot disagree.
    /// Kind-specific fields start at 0 for `ServerAck`/`ServerError` and are
    /// `None` for every other kind.
    pub fn new(kind: MessageKind, flags: Flags, sequence: Option<i32>, payload: Bytes) -> Self {
        Self {
            kind,
            flags: flags.with_sequence(sequence.is_some()),
            serialization: Serialization::Json,
            compression: Compression::Gzip,
            sequence,
            ack_sequence: (kind == MessageKind::ServerAck).then_some(0),
            error_code: (kind == MessageKind::ServerError).then_some(0),
            payload,
        }
    }

    /// Server acknowledgement of `ack_sequence`.
    pub fn server_ack(flags: Flags, sequence: Option<i32>, ack_sequence: i32, payload: Bytes) -> Self {
        Self {
            ack_sequence: Some(ack_sequence),
            ..Self::new(MessageKind::ServerAck, flags, sequence, payload)
        }
    }

    /// Server error response.
    pub fn server_error(code: u32, payload: Bytes) -> Self {
        Self {
            error_code: Some(code),
            ..Self::new(MessageKind::ServerError, Flags::NONE, None, payload)
        }
    }

    pub fn with_serialization(mut self, serialization: Serialization) -> Self {
        self.serialization = serialization;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn is_last_package(&self) -> bool {
        self.flags.is_last_package()
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Bytes {
        encode_frame(self)
    }
}

/// Encode a frame with the default envelope (JSON + gzip header nibbles).
pub fn encode(kind: MessageKind, flags: Flags, sequence: Option<i32>, payload: Bytes) -> Bytes {
    Frame::new(kind, flags, sequence, payload).encode()
}

/// Serialize a frame to wire bytes.
pub fn encode_frame(frame: &Frame) -> Bytes {
    let flags = frame.flags.with_sequence(frame.sequence.is_some());
    let mut out = BytesMut::with_capacity(HEADER_LEN + 12 + frame.payload.len());

    out.put_u8((PROTOCOL_VERSION << 4) | HEADER_WORDS);
    out.put_u8((frame.kind.bits() << 4) | flags.bits());
    out.put_u8((frame.serialization.bits() << 4) | frame.compression.bits());
    out.put_u8(0x00);

    if let Some(seq) = frame.sequence {
        out.put_i32(seq);
    }

    match frame.kind {
        MessageKind::ServerAck => {
            out.put_i32(frame.ack_sequence.unwrap_or_default());
            // A bare ack carries no length prefix.
            if !frame.payload.is_empty() {
                put_len_prefixed(&mut out, &frame.payload);
            }
        }
        MessageKind::ServerError => {
            out.put_u32(frame.error_code.unwrap_or_default());
            put_len_prefixed(&mut out, &frame.payload);
        }
        MessageKind::Unknown(_) => out.put_slice(&frame.payload),
        _ => put_len_prefixed(&mut out, &frame.payload),
    }

    out.freeze()
}

fn put_len_prefixed(out: &mut BytesMut, payload: &[u8]) {
    out.put_u32(payload.len() as u32);
    out.put_slice(payload);
}

fn need(buf: &Bytes, needed: usize, field: &'static str) -> Result<(), FrameError> {
    if buf.remaining() < needed {
        return Err(FrameError::Truncated {
            field,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn take_payload(buf: &mut Bytes, len: usize) -> Result<Bytes, FrameError> {
    need(buf, len, "payload")?;
    Ok(buf.copy_to_bytes(len))
}

fn take_u32_len(buf: &mut Bytes) -> Result<usize, FrameError> {
    need(buf, 4, "payload length")?;
    Ok(buf.get_u32() as usize)
}

/// Decode one frame from wire bytes.
pub fn decode_frame(mut buf: Bytes) -> Result<Frame, FrameError> {
    need(&buf, HEADER_LEN, "header")?;

    let b0 = buf.get_u8();
    let version = b0 >> 4;
    if version != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    let header_words = b0 & 0x0f;
    if header_words != HEADER_WORDS {
        return Err(FrameError::UnsupportedHeaderSize(header_words));
    }

    let b1 = buf.get_u8();
    let kind = MessageKind::from_bits(b1 >> 4);
    let flags = Flags::from_bits(b1);

    let b2 = buf.get_u8();
    let serialization = Serialization::from_bits(b2 >> 4)?;
    let compression = Compression::from_bits(b2)?;

    let _reserved = buf.get_u8();

    let sequence = if flags.has_sequence() {
        need(&buf, 4, "sequence")?;
        Some(buf.get_i32())
    } else {
        None
    };

    let mut ack_sequence = None;
    let mut error_code = None;

    let payload = match kind {
        MessageKind::ServerFull => {
            need(&buf, 4, "payload length")?;
            let len = buf.get_i32();
            if len < 0 {
                return Err(FrameError::NegativeLength(len));
            }
            take_payload(&mut buf, len as usize)?
        }
        MessageKind::ServerAck => {
            need(&buf, 4, "ack sequence")?;
            ack_sequence = Some(buf.get_i32());
            if buf.remaining() >= 4 {
                let len = take_u32_len(&mut buf)?;
                take_payload(&mut buf, len)?
            } else {
                Bytes::new()
            }
        }
        MessageKind::ServerError => {
            need(&buf, 4, "error code")?;
            error_code = Some(buf.get_u32());
            let len = take_u32_len(&mut buf)?;
            take_payload(&mut buf, len)?
        }
        MessageKind::ClientConfig | MessageKind::ClientAudio => {
            let len = take_u32_len(&mut buf)?;
            take_payload(&mut buf, len)?
        }
        MessageKind::Unknown(bits) => {
            warn!(kind = bits, len = buf.remaining(), "unknown message kind, keeping raw payload");
            buf.copy_to_bytes(buf.remaining())
        }
    };

    if buf.has_remaining() {
        debug!(kind = kind.as_str(), trailing = buf.remaining(), "ignoring trailing bytes after payload");
    }

    Ok(Frame {
        kind,
        flags,
        serialization,
        compression,
        sequence,
        ack_sequence,
        error_code,
        payload,
    })
}
