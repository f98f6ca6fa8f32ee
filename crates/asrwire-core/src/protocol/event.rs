//! Interpretation of decoded server frames.

use serde_json::Value;

use super::frame::{Frame, MessageKind};
use super::payload::{self, Anomaly, PayloadValue};

const UNKNOWN_ERROR: &str = "unknown error";

/// What a server frame means to a recognition session.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Ack or full response, possibly carrying a transcript fragment.
    Response {
        kind: MessageKind,
        sequence: Option<i32>,
        text: Option<String>,
        is_last_package: bool,
    },
    /// Server-reported failure. Terminal for the session.
    Error { code: u32, message: String },
}

/// A server event plus any payload anomalies seen while unwrapping it.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpreted {
    pub event: ServerEvent,
    pub anomalies: Vec<Anomaly>,
}

/// Unwrap a frame's payload and classify it.
///
/// An error frame with code 0 is treated as an ordinary response.
pub fn interpret(frame: &Frame) -> Interpreted {
    let unwrapped = payload::unwrap(&frame.payload, frame.compression, frame.serialization);

    let event = match frame.error_code {
        Some(code) if code != 0 => ServerEvent::Error {
            code,
            message: error_message(&unwrapped.value),
        },
        _ => ServerEvent::Response {
            kind: frame.kind,
            sequence: frame.sequence,
            text: match &unwrapped.value {
                PayloadValue::Structured(v) => transcript_text(v).map(str::to_owned),
                PayloadValue::Text(_) => None,
            },
            is_last_package: frame.is_last_package(),
        },
    };

    Interpreted {
        event,
        anomalies: unwrapped.anomalies,
    }
}

/// Transcript under `result.text`, else `data.result.text`.
///
/// The server uses both shapes; the first present wins even if empty.
pub fn transcript_text(value: &Value) -> Option<&str> {
    value
        .pointer("/result/text")
        .or_else(|| value.pointer("/data/result/text"))
        .and_then(Value::as_str)
}

fn error_message(value: &PayloadValue) -> String {
    match value {
        PayloadValue::Structured(v) => v
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ERROR)
            .to_owned(),
        PayloadValue::Text(s) if !s.is_empty() => s.clone(),
        PayloadValue::Text(_) => UNKNOWN_ERROR.to_owned(),
    }
}
