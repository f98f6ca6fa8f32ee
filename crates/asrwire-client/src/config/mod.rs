//! Client config loader (strict parsing plus environment overlay).
//!
//! The environment is the primary source; YAML is optional and parsed with
//! `deny_unknown_fields` so typos fail loudly.

pub mod schema;

use std::fs;

use asrwire_core::error::{RecognitionError, Result};

pub use schema::{
    AudioSection, ClientConfig, Credential, EndpointSection, RequestSection, TimeoutSection,
    WakeSection,
};

pub const ENV_API_KEY: &str = "QINIU_OPENAI_API_KEY";
pub const ENV_BASE_WS: &str = "QINIU_OPENAI_BASE_WS";
pub const ENV_SAMPLE_RATE: &str = "QINIU_ASR_SAMPLE_RATE";
pub const ENV_CHANNELS: &str = "QINIU_ASR_CHANNELS";
pub const ENV_BITS: &str = "QINIU_ASR_BITS";
pub const ENV_SEG_DURATION_MS: &str = "QINIU_ASR_SEG_DURATION_MS";

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RecognitionError::Config(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig = serde_yaml::from_str(s)
        .map_err(|e| RecognitionError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Defaults overlaid with the process environment.
pub fn from_env() -> Result<ClientConfig> {
    let mut cfg = ClientConfig::default();
    apply_env(&mut cfg)?;
    Ok(cfg)
}

/// Overlay the process environment onto `cfg` and re-validate.
pub fn apply_env(cfg: &mut ClientConfig) -> Result<()> {
    apply_overrides(cfg, |name| std::env::var(name).ok())
}

/// Overlay values from `lookup` (keyed by the `QINIU_*` variable names).
///
/// Blank values are treated as unset.
pub fn apply_overrides<F>(cfg: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = get(ENV_API_KEY) {
        cfg.endpoint.api_key = Some(Credential::new(key.trim()));
    }
    if let Some(base) = get(ENV_BASE_WS) {
        cfg.endpoint.base_ws = base.trim().to_owned();
    }
    if let Some(v) = get(ENV_SAMPLE_RATE) {
        cfg.audio.sample_rate = parse_number(ENV_SAMPLE_RATE, &v)?;
    }
    if let Some(v) = get(ENV_CHANNELS) {
        cfg.audio.channels = parse_number(ENV_CHANNELS, &v)?;
    }
    if let Some(v) = get(ENV_BITS) {
        cfg.audio.bits = parse_number(ENV_BITS, &v)?;
    }
    if let Some(v) = get(ENV_SEG_DURATION_MS) {
        cfg.audio.seg_duration_ms = parse_number(ENV_SEG_DURATION_MS, &v)?;
    }

    cfg.validate()
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RecognitionError::Config(format!("{name} must be a number, got {raw:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overlay(pairs: &[(&str, &str)]) -> Result<ClientConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut cfg = ClientConfig::default();
        apply_overrides(&mut cfg, |name| env.get(name).cloned())?;
        Ok(cfg)
    }

    #[test]
    fn defaults_match_recognizer_expectations() {
        let cfg = overlay(&[]).unwrap();
        assert_eq!(cfg.endpoint.url(), "wss://openai.qiniu.com/v1/voice/asr");
        assert_eq!(cfg.audio.sample_rate, 16000);
        assert_eq!(cfg.audio.bits, 16);
        assert_eq!(cfg.audio.channels, 1);
        assert_eq!(cfg.audio.seg_duration_ms, 300);
        assert_eq!(cfg.timeouts.connect_ms, 10000);
        assert_eq!(cfg.timeouts.config_ack_ms, 5000);
        assert_eq!(cfg.timeouts.command_ms, 10000);
        assert_eq!(cfg.timeouts.wake_ms, 5000);
        assert!(cfg.endpoint.credential().is_err());
    }

    #[test]
    fn env_overrides_endpoint_and_audio() {
        let cfg = overlay(&[
            (ENV_API_KEY, " sk-test "),
            (ENV_BASE_WS, "ws://127.0.0.1:9000/v1/"),
            (ENV_SAMPLE_RATE, "8000"),
            (ENV_CHANNELS, "2"),
            (ENV_SEG_DURATION_MS, ""),
        ])
        .unwrap();

        assert_eq!(cfg.endpoint.url(), "ws://127.0.0.1:9000/v1/voice/asr");
        assert_eq!(cfg.endpoint.credential().unwrap().expose(), "sk-test");
        assert_eq!(cfg.audio.sample_rate, 8000);
        assert_eq!(cfg.audio.channels, 2);
        assert_eq!(cfg.audio.seg_duration_ms, 300);
    }

    #[test]
    fn non_numeric_env_is_a_config_error() {
        let err = overlay(&[(ENV_BITS, "sixteen")]).unwrap_err();
        assert_eq!(err.kind().as_str(), "CONFIG");
    }

    #[test]
    fn out_of_range_env_fails_validation() {
        let err = overlay(&[(ENV_CHANNELS, "6")]).unwrap_err();
        assert!(err.to_string().contains("audio.channels"));
    }

    #[test]
    fn credential_is_redacted_in_debug() {
        let cfg = overlay(&[(ENV_API_KEY, "sk-very-secret")]).unwrap();
        let dump = format!("{cfg:?}");
        assert!(!dump.contains("sk-very-secret"));
        assert!(dump.contains("Credential(***)"));
    }
}
