//! Classify raw WebSocket messages before they reach the session.
//!
//! Binary messages carry protocol frames. Everything else is lifecycle noise
//! the recognizer may emit (text diagnostics, keepalives, close).

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug)]
pub enum Inbound {
    Frame(Bytes),
    Text(String),
    Ping(Vec<u8>),
    Pong,
    Close(Option<String>),
}

pub fn classify(msg: Message) -> Inbound {
    match msg {
        Message::Binary(b) => Inbound::Frame(Bytes::from(b)),
        Message::Text(s) => Inbound::Text(s.to_string()),
        Message::Ping(v) => Inbound::Ping(v.to_vec()),
        Message::Pong(_) => Inbound::Pong,
        Message::Close(frame) => Inbound::Close(frame.map(|f| format!("{} {}", f.code, f.reason))),
        Message::Frame(f) => Inbound::Frame(Bytes::from(f.into_data())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_is_a_frame() {
        match classify(Message::Binary(vec![0x11, 0x90, 0x11, 0x00])) {
            Inbound::Frame(b) => assert_eq!(&b[..], &[0x11, 0x90, 0x11, 0x00]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn text_and_close_are_lifecycle() {
        assert!(matches!(classify(Message::Text("hello".into())), Inbound::Text(_)));
        assert!(matches!(classify(Message::Close(None)), Inbound::Close(None)));
        assert!(matches!(classify(Message::Pong(vec![])), Inbound::Pong));
    }
}
