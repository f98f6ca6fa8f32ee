//! Session descriptor carried by the config frame.

use serde::{Deserialize, Serialize};

/// Full client request body (JSON, gzip-compressed on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub user: UserInfo,
    pub audio: AudioFormat,
    pub request: RequestOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Per-attempt identifier.
    pub uid: String,
}

/// Raw PCM description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Container, always `"pcm"` for this client.
    pub format: String,
    pub sample_rate: u32,
    pub bits: u16,
    pub channel: u16,
    /// Codec identifier, `"raw"` for uncompressed PCM.
    pub codec: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub model_name: String,
    pub enable_punc: bool,
}

impl SessionRequest {
    pub fn new(uid: impl Into<String>, audio: AudioFormat, request: RequestOptions) -> Self {
        Self {
            user: UserInfo { uid: uid.into() },
            audio,
            request,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            format: "pcm".into(),
            sample_rate: 16000,
            bits: 16,
            channel: 1,
            codec: "raw".into(),
        }
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model_name: "asr".into(),
            enable_punc: true,
        }
    }
}
