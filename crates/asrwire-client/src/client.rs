//! Caller-facing recognition API.
//!
//! A [`RecognitionClient`] is cheap to clone and may be shared across tasks.
//! Every call opens a fresh [`RecognitionSession`]; no connection state is
//! reused between attempts.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use asrwire_core::error::{RecognitionError, Result};

use crate::config::ClientConfig;
use crate::obs::ClientMetrics;
use crate::session::{
    cancel_pair, CancelHandle, Completion, RecognitionSession, SessionMode, Transcript,
};
use crate::transport::{Connector, WsConnector};

pub struct RecognitionClient<C: Connector = WsConnector> {
    config: Arc<ClientConfig>,
    connector: Arc<C>,
    metrics: Arc<ClientMetrics>,
}

impl<C: Connector> Clone for RecognitionClient<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            connector: Arc::clone(&self.connector),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl RecognitionClient<WsConnector> {
    /// Client over real WebSocket connections. Validates `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> RecognitionClient<C> {
    pub fn with_connector(config: ClientConfig, connector: C) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            connector: Arc::new(connector),
            metrics: Arc::new(ClientMetrics::default()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    /// A fresh single-use session.
    pub fn session(&self, mode: SessionMode) -> RecognitionSession<C> {
        RecognitionSession::new(
            Arc::clone(&self.config),
            Arc::clone(&self.connector),
            Arc::clone(&self.metrics),
            mode,
        )
    }

    /// Transcribe `pcm` and report how the exchange ended.
    pub async fn recognize(&self, pcm: &[u8]) -> Result<Transcript> {
        self.session(SessionMode::Command).run(pcm).await
    }

    /// Transcribe `pcm`. `Ok(None)` when nothing was recognized.
    pub async fn recognize_text(&self, pcm: &[u8]) -> Result<Option<String>> {
        Ok(self.recognize(pcm).await?.text)
    }

    /// Whether `pcm` contains one of the configured wake phrases.
    ///
    /// Returns early once a phrase appears in a partial transcript.
    pub async fn detect_wake_word(&self, pcm: &[u8]) -> Result<bool> {
        let transcript = self.session(SessionMode::WakeWord).run(pcm).await?;
        if transcript.completion == Completion::WakePhrase {
            return Ok(true);
        }
        let phrases = self.config.wake.phrase_set();
        Ok(transcript
            .text
            .as_deref()
            .is_some_and(|text| phrases.matches(text)))
    }

    /// Run a session on the runtime and hand back a cancellable handle.
    pub fn spawn_recognize(&self, pcm: Vec<u8>, mode: SessionMode) -> RecognitionHandle {
        let (cancel, signal) = cancel_pair();
        let mut session = self.session(mode).with_cancel(signal);
        debug!(uid = session.uid(), mode = mode.as_str(), "spawning recognition");

        let join = tokio::spawn(async move { session.run(&pcm).await });
        RecognitionHandle { join, cancel }
    }
}

/// An in-flight recognition started by [`RecognitionClient::spawn_recognize`].
///
/// Dropping the handle does not cancel the session.
pub struct RecognitionHandle {
    join: JoinHandle<Result<Transcript>>,
    cancel: CancelHandle,
}

impl RecognitionHandle {
    /// Stop the session at its next await point. It resolves with
    /// `Completion::Cancelled` and whatever text had arrived.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<Transcript> {
        self.join
            .await
            .map_err(|e| RecognitionError::Internal(format!("recognition task failed: {e}")))?
    }
}
