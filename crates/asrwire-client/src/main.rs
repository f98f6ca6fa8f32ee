//! asrwire CLI
//!
//! Usage: `asrwire <pcm-file> [--wake] [--config <yaml>] [--metrics]`
//!
//! Reads raw PCM matching the configured audio format, sends it to the
//! recognizer and prints the transcript (or the wake-word verdict).

use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use asrwire_client::config;
use asrwire_client::transport::ws::install_crypto_provider;
use asrwire_client::RecognitionClient;
use asrwire_core::error::{RecognitionError, Result};

struct Args {
    pcm_path: String,
    wake: bool,
    config_path: Option<String>,
    metrics: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut positional = Vec::new();
    let mut wake = false;
    let mut config_path = None;
    let mut metrics = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--wake" => wake = true,
            "--metrics" => metrics = true,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| RecognitionError::Config("--config needs a path".into()))?;
                config_path = Some(path);
            }
            flag if flag.starts_with("--") => {
                return Err(RecognitionError::Config(format!("unknown flag '{flag}'")));
            }
            other => positional.push(other.to_owned()),
        }
    }

    if positional.len() > 1 {
        return Err(RecognitionError::Config(format!(
            "unexpected argument '{}'",
            positional[1]
        )));
    }
    let pcm_path = positional.pop().ok_or_else(|| {
        RecognitionError::Config(
            "usage: asrwire <pcm-file> [--wake] [--config <yaml>] [--metrics]".into(),
        )
    })?;

    Ok(Args {
        pcm_path,
        wake,
        config_path,
        metrics,
    })
}

async fn run() -> Result<()> {
    let args = parse_args()?;

    let cfg = match &args.config_path {
        Some(path) => {
            let mut cfg = config::load_from_file(path)?;
            config::apply_env(&mut cfg)?;
            cfg
        }
        None => config::from_env()?,
    };

    let pcm = tokio::fs::read(&args.pcm_path)
        .await
        .map_err(|e| RecognitionError::Config(format!("read {} failed: {e}", args.pcm_path)))?;
    info!(path = %args.pcm_path, bytes = pcm.len(), wake = args.wake, "loaded audio");

    let client = RecognitionClient::new(cfg)?;
    if args.wake {
        let detected = client.detect_wake_word(&pcm).await?;
        println!("{detected}");
    } else {
        let transcript = client.recognize(&pcm).await?;
        let completion = transcript.completion.as_str();
        match transcript.text {
            Some(text) => {
                info!(completion, fragments = transcript.fragments, "recognized");
                println!("{text}");
            }
            None => info!(completion, "no speech recognized"),
        }
    }

    if args.metrics {
        eprint!("{}", client.metrics().render());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    install_crypto_provider();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = e.kind().as_str(), error = %e, "recognition failed");
            ExitCode::FAILURE
        }
    }
}
