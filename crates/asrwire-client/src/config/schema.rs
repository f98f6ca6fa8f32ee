use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use asrwire_core::accumulator::WakePhrases;
use asrwire_core::error::{RecognitionError, Result};
use asrwire_core::protocol::request::{AudioFormat, RequestOptions};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    #[serde(default)]
    pub endpoint: EndpointSection,

    #[serde(default)]
    pub audio: AudioSection,

    #[serde(default)]
    pub request: RequestSection,

    #[serde(default)]
    pub timeouts: TimeoutSection,

    #[serde(default)]
    pub wake: WakeSection,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: 1,
            endpoint: EndpointSection::default(),
            audio: AudioSection::default(),
            request: RequestSection::default(),
            timeouts: TimeoutSection::default(),
            wake: WakeSection::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RecognitionError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.endpoint.validate()?;
        self.audio.validate()?;
        self.request.validate()?;
        self.timeouts.validate()?;
        self.wake.validate()?;

        Ok(())
    }
}

/// Bearer credential. Never printed.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    #[serde(default = "default_base_ws")]
    pub base_ws: String,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default)]
    pub api_key: Option<Credential>,
}

impl Default for EndpointSection {
    fn default() -> Self {
        Self {
            base_ws: default_base_ws(),
            path: default_path(),
            api_key: None,
        }
    }
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_ws.starts_with("ws://") || self.base_ws.starts_with("wss://")) {
            return Err(RecognitionError::Config(
                "endpoint.base_ws must be a ws:// or wss:// url".into(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(RecognitionError::Config(
                "endpoint.path must start with '/'".into(),
            ));
        }
        Ok(())
    }

    /// Full recognizer URL.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_ws.trim_end_matches('/'), self.path)
    }

    /// The configured credential, or a config error naming the env var.
    pub fn credential(&self) -> Result<&Credential> {
        match &self.api_key {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(RecognitionError::Config(
                "missing api key (set QINIU_OPENAI_API_KEY)".into(),
            )),
        }
    }
}

fn default_base_ws() -> String {
    "wss://openai.qiniu.com/v1".into()
}
fn default_path() -> String {
    "/voice/asr".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioSection {
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_bits")]
    pub bits: u16,

    #[serde(default = "default_channels")]
    pub channels: u16,

    #[serde(default = "default_codec")]
    pub codec: String,

    /// Reserved for chunked streaming; audio is currently sent as one chunk.
    #[serde(default = "default_seg_duration_ms")]
    pub seg_duration_ms: u32,
}

impl Default for AudioSection {
    fn default() -> Self {
        Self {
            format: default_format(),
            sample_rate: default_sample_rate(),
            bits: default_bits(),
            channels: default_channels(),
            codec: default_codec(),
            seg_duration_ms: default_seg_duration_ms(),
        }
    }
}

impl AudioSection {
    pub fn validate(&self) -> Result<()> {
        if !(8000..=48000).contains(&self.sample_rate) {
            return Err(RecognitionError::Config(
                "audio.sample_rate must be between 8000 and 48000".into(),
            ));
        }
        if !matches!(self.bits, 8 | 16 | 24 | 32) {
            return Err(RecognitionError::Config(
                "audio.bits must be one of 8, 16, 24, 32".into(),
            ));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(RecognitionError::Config(
                "audio.channels must be 1 (mono) or 2 (stereo)".into(),
            ));
        }
        if !(10..=10000).contains(&self.seg_duration_ms) {
            return Err(RecognitionError::Config(
                "audio.seg_duration_ms must be between 10 and 10000".into(),
            ));
        }
        Ok(())
    }

    /// Descriptor sent in the config frame.
    pub fn descriptor(&self) -> AudioFormat {
        AudioFormat {
            format: self.format.clone(),
            sample_rate: self.sample_rate,
            bits: self.bits,
            channel: self.channels,
            codec: self.codec.clone(),
        }
    }
}

fn default_format() -> String {
    "pcm".into()
}
fn default_sample_rate() -> u32 {
    16000
}
fn default_bits() -> u16 {
    16
}
fn default_channels() -> u16 {
    1
}
fn default_codec() -> String {
    "raw".into()
}
fn default_seg_duration_ms() -> u32 {
    300
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    #[serde(default = "default_enable_punc")]
    pub enable_punc: bool,
}

impl Default for RequestSection {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            enable_punc: default_enable_punc(),
        }
    }
}

impl RequestSection {
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(RecognitionError::Config(
                "request.model_name must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> RequestOptions {
        RequestOptions {
            model_name: self.model_name.clone(),
            enable_punc: self.enable_punc,
        }
    }
}

fn default_model_name() -> String {
    "asr".into()
}
fn default_enable_punc() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutSection {
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,

    #[serde(default = "default_config_ack_ms")]
    pub config_ack_ms: u64,

    /// Receive-loop budget when transcribing a command.
    #[serde(default = "default_command_ms")]
    pub command_ms: u64,

    /// Receive-loop budget when listening for the wake phrase.
    #[serde(default = "default_wake_ms")]
    pub wake_ms: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            config_ack_ms: default_config_ack_ms(),
            command_ms: default_command_ms(),
            wake_ms: default_wake_ms(),
        }
    }
}

impl TimeoutSection {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("connect_ms", self.connect_ms),
            ("config_ack_ms", self.config_ack_ms),
            ("command_ms", self.command_ms),
            ("wake_ms", self.wake_ms),
        ];
        for (name, value) in fields {
            if !(50..=120000).contains(&value) {
                return Err(RecognitionError::Config(format!(
                    "timeouts.{name} must be between 50 and 120000"
                )));
            }
        }
        if self.wake_ms > self.command_ms {
            return Err(RecognitionError::Config(
                "timeouts.wake_ms must not exceed command_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn config_ack(&self) -> Duration {
        Duration::from_millis(self.config_ack_ms)
    }

    pub fn command(&self) -> Duration {
        Duration::from_millis(self.command_ms)
    }

    pub fn wake(&self) -> Duration {
        Duration::from_millis(self.wake_ms)
    }
}

fn default_connect_ms() -> u64 {
    10000
}
fn default_config_ack_ms() -> u64 {
    5000
}
fn default_command_ms() -> u64 {
    10000
}
fn default_wake_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WakeSection {
    #[serde(default = "default_phrases")]
    pub phrases: Vec<String>,
}

impl Default for WakeSection {
    fn default() -> Self {
        Self {
            phrases: default_phrases(),
        }
    }
}

impl WakeSection {
    pub fn validate(&self) -> Result<()> {
        if self.phrase_set().is_empty() {
            return Err(RecognitionError::Config(
                "wake.phrases must contain at least one non-blank phrase".into(),
            ));
        }
        Ok(())
    }

    pub fn phrase_set(&self) -> WakePhrases {
        WakePhrases::new(&self.phrases)
    }
}

fn default_phrases() -> Vec<String> {
    WakePhrases::default().iter().map(str::to_owned).collect()
}
