#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use asrwire_client::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
audio:
  sample_rate: 16000
  chanels: 1 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.kind().as_str(), "CONFIG");
    assert!(err.to_string().contains("chanels"));
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.request.model_name, "asr");
    assert!(cfg.request.enable_punc);
    assert_eq!(cfg.wake.phrases, vec!["任意门", "任意", "hi"]);
}

#[test]
fn full_config_round_trips_into_sections() {
    let ok = r#"
version: 1
endpoint:
  base_ws: "ws://127.0.0.1:7000/v1"
  api_key: "sk-from-yaml"
audio:
  sample_rate: 8000
  bits: 16
  channels: 1
request:
  model_name: "asr-large"
  enable_punc: false
timeouts:
  connect_ms: 2000
  config_ack_ms: 1000
  command_ms: 4000
  wake_ms: 1500
wake:
  phrases: ["Open Sesame"]
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.endpoint.url(), "ws://127.0.0.1:7000/v1/voice/asr");
    assert_eq!(cfg.endpoint.credential().unwrap().expose(), "sk-from-yaml");
    assert_eq!(cfg.audio.descriptor().sample_rate, 8000);
    assert_eq!(cfg.request.options().model_name, "asr-large");
    assert!(cfg.wake.phrase_set().matches("please OPEN SESAME now"));
}

#[test]
fn unsupported_version_rejected() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert!(err.to_string().contains("version"));
}

#[test]
fn wake_budget_may_not_exceed_command_budget() {
    let bad = r#"
version: 1
timeouts:
  command_ms: 3000
  wake_ms: 5000
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(err.to_string().contains("wake_ms"));
}

#[test]
fn blank_wake_phrases_rejected() {
    let bad = r#"
version: 1
wake:
  phrases: ["  ", ""]
"#;
    assert!(config::load_from_str(bad).is_err());
}
