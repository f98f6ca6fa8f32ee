//! Payload transcoding: serialize-then-compress on the way out,
//! decompress-then-deserialize on the way in.
//!
//! Inbound transcoding never fails. Undecompressable bytes are treated as
//! already plain and undeserializable JSON is surfaced as text; both are
//! reported as [`Anomaly`] so callers can count them.

use std::io::{Read, Write};

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::frame::{Compression, Serialization};
use crate::error::{RecognitionError, Result};

/// Decoded payload: structured JSON or plain text.
///
/// A bare JSON string is always `Text`; `Structured` holds objects, arrays,
/// numbers, booleans and null.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Structured(Value),
    Text(String),
}

impl PayloadValue {
    /// Canonical form of a parsed JSON document.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => PayloadValue::Text(s),
            other => PayloadValue::Structured(other),
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            PayloadValue::Structured(v) => Some(v),
            PayloadValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(s) => Some(s),
            PayloadValue::Structured(_) => None,
        }
    }
}

/// Non-fatal irregularity observed while unwrapping a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Gzip-tagged bytes failed to decompress and were used as-is.
    DecompressFallback,
    /// JSON-tagged bytes failed to parse and were surfaced as text.
    JsonFallback,
}

impl Anomaly {
    pub fn as_str(self) -> &'static str {
        match self {
            Anomaly::DecompressFallback => "decompress_fallback",
            Anomaly::JsonFallback => "json_fallback",
        }
    }
}

/// Result of [`unwrap`].
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    pub value: PayloadValue,
    pub anomalies: Vec<Anomaly>,
}

/// Serialize then compress a payload value.
pub fn wrap(value: &PayloadValue, compression: Compression, serialization: Serialization) -> Result<Bytes> {
    let serialized = match (value, serialization) {
        (PayloadValue::Structured(v), _) => serde_json::to_vec(v),
        (PayloadValue::Text(s), Serialization::Json) => serde_json::to_vec(s),
        (PayloadValue::Text(s), Serialization::None) => Ok(s.as_bytes().to_vec()),
    }
    .map_err(|e| RecognitionError::Internal(format!("serialize payload failed: {e}")))?;

    compress(&serialized, compression)
}

/// Serialize any value as JSON, then compress.
pub fn wrap_json<T: Serialize + ?Sized>(value: &T, compression: Compression) -> Result<Bytes> {
    let serialized = serde_json::to_vec(value)
        .map_err(|e| RecognitionError::Internal(format!("serialize payload failed: {e}")))?;
    compress(&serialized, compression)
}

/// Compress raw bytes (no serialization), e.g. PCM audio.
pub fn wrap_raw(bytes: &[u8], compression: Compression) -> Result<Bytes> {
    compress(bytes, compression)
}

/// Decompress then deserialize an inbound payload.
pub fn unwrap(raw: &Bytes, compression: Compression, serialization: Serialization) -> Unwrapped {
    let mut anomalies = Vec::new();

    if raw.is_empty() {
        return Unwrapped {
            value: PayloadValue::Text(String::new()),
            anomalies,
        };
    }

    let plain = match compression {
        Compression::None => raw.clone(),
        Compression::Gzip => match gunzip(raw) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(error = %e, len = raw.len(), "gzip decompress failed, treating payload as plain bytes");
                anomalies.push(Anomaly::DecompressFallback);
                raw.clone()
            }
        },
    };

    let value = match serialization {
        Serialization::Json => match serde_json::from_slice::<Value>(&plain) {
            Ok(v) => PayloadValue::from_json(v),
            Err(e) => {
                warn!(error = %e, len = plain.len(), "json payload failed to parse, surfacing as text");
                anomalies.push(Anomaly::JsonFallback);
                PayloadValue::Text(String::from_utf8_lossy(&plain).into_owned())
            }
        },
        Serialization::None => PayloadValue::Text(String::from_utf8_lossy(&plain).into_owned()),
    };

    Unwrapped { value, anomalies }
}

fn compress(bytes: &[u8], compression: Compression) -> Result<Bytes> {
    match compression {
        Compression::None => Ok(Bytes::copy_from_slice(bytes)),
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 32), flate2::Compression::default());
            encoder
                .write_all(bytes)
                .map_err(|e| RecognitionError::Internal(format!("gzip compress failed: {e}")))?;
            let out = encoder
                .finish()
                .map_err(|e| RecognitionError::Internal(format!("gzip finish failed: {e}")))?;
            Ok(Bytes::from(out))
        }
    }
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    MultiGzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
