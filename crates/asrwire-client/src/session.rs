//! One recognition attempt.
//!
//! `Idle -> Connected -> ConfigAcked -> AudioSent -> Accumulating` and then one
//! of the terminal states. A session is single-use: it is driven once by
//! [`RecognitionSession::run`] and then discarded.
//!
//! Every phase is bounded by its own deadline and by an external cancel
//! signal. Server error frames are terminal and nothing is sent after one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use asrwire_core::accumulator::{ResultAccumulator, WakePhrases};
use asrwire_core::error::{Phase, RecognitionError, Result};
use asrwire_core::protocol::event::{interpret, ServerEvent};
use asrwire_core::protocol::frame::{
    decode_frame, Compression, Flags, Frame, MessageKind, AUTO_ASSIGN_SEQUENCE,
};
use asrwire_core::protocol::payload;
use asrwire_core::protocol::request::SessionRequest;

use crate::config::ClientConfig;
use crate::obs::ClientMetrics;
use crate::transport::{Connector, FrameTransport};

/// Upper bound on the closing handshake once the exchange is over.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// What the caller wants out of the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Full transcript; waits for the last package.
    Command,
    /// Stop as soon as a wake phrase shows up.
    WakeWord,
}

impl SessionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Command => "command",
            SessionMode::WakeWord => "wake_word",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    ConfigAcked,
    AudioSent,
    Accumulating,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Failed
                | SessionState::TimedOut
                | SessionState::Cancelled
        )
    }
}

/// Why a successful session stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    FinalPackage,
    WakePhrase,
    /// Receive budget ran out after at least one fragment arrived.
    TimedOut,
    ConnectionClosed,
    Cancelled,
}

impl Completion {
    pub fn as_str(self) -> &'static str {
        match self {
            Completion::FinalPackage => "final_package",
            Completion::WakePhrase => "wake_phrase",
            Completion::TimedOut => "timed_out",
            Completion::ConnectionClosed => "connection_closed",
            Completion::Cancelled => "cancelled",
        }
    }
}

/// Result of a session that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Best-known transcript; `None` when nothing non-empty was recognized.
    pub text: Option<String>,
    pub completion: Completion,
    /// Number of non-empty fragments received.
    pub fragments: usize,
}

/// Caller side of a cancel signal. Cloneable; firing is idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Session side of a cancel signal.
#[derive(Debug, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
            if fired {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelSignal { rx: Some(rx) })
}

enum Step<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

async fn bounded<F: Future>(cancel: &mut CancelSignal, deadline: Instant, fut: F) -> Step<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Step::Cancelled,
        out = timeout_at(deadline, fut) => match out {
            Ok(v) => Step::Done(v),
            Err(_) => Step::TimedOut,
        },
    }
}

pub struct RecognitionSession<C: Connector> {
    config: Arc<ClientConfig>,
    connector: Arc<C>,
    metrics: Arc<ClientMetrics>,
    mode: SessionMode,
    uid: String,
    state: SessionState,
    next_sequence: i32,
    accumulator: ResultAccumulator,
    wake: WakePhrases,
    cancel: CancelSignal,
}

impl<C: Connector> RecognitionSession<C> {
    pub fn new(
        config: Arc<ClientConfig>,
        connector: Arc<C>,
        metrics: Arc<ClientMetrics>,
        mode: SessionMode,
    ) -> Self {
        let wake = config.wake.phrase_set();
        Self {
            config,
            connector,
            metrics,
            mode,
            uid: Uuid::new_v4().to_string(),
            state: SessionState::Idle,
            next_sequence: 1,
            accumulator: ResultAccumulator::new(),
            wake,
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Per-attempt user id sent in the config frame.
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Drive the whole exchange for `pcm`.
    ///
    /// Errors leave the session in `Failed` or `TimedOut`; a second call is
    /// rejected.
    pub async fn run(&mut self, pcm: &[u8]) -> Result<Transcript> {
        if self.state != SessionState::Idle {
            return Err(RecognitionError::Internal(
                "recognition session already used".into(),
            ));
        }

        let mode = self.mode.as_str();
        let span = info_span!("asr_session", uid = %self.uid, mode);

        self.metrics.sessions_active.inc(&[("mode", mode)]);
        let started = Instant::now();

        let result = self.drive(pcm).instrument(span).await;

        self.metrics.sessions_active.dec(&[("mode", mode)]);
        self.metrics
            .session_duration
            .observe(&[("mode", mode)], started.elapsed());
        let outcome = match &result {
            Ok(t) => t.completion.as_str(),
            Err(e) => e.kind().as_str(),
        };
        self.metrics
            .sessions
            .inc(&[("mode", mode), ("outcome", outcome)]);

        result
    }

    async fn drive(&mut self, pcm: &[u8]) -> Result<Transcript> {
        if pcm.is_empty() {
            warn!("refusing to open a session for empty audio");
            return Err(self.fail(RecognitionError::EmptyAudio));
        }

        let config = Arc::clone(&self.config);
        let credential = match config.endpoint.credential() {
            Ok(c) => c,
            Err(e) => return Err(self.fail(e)),
        };
        let url = config.endpoint.url();

        let connector = Arc::clone(&self.connector);
        let deadline = Instant::now() + config.timeouts.connect();
        let mut transport =
            match bounded(&mut self.cancel, deadline, connector.connect(&url, credential)).await {
                Step::Done(Ok(t)) => t,
                Step::Done(Err(e)) => {
                    error!(error = %e, kind = e.kind().as_str(), "connect failed");
                    return Err(self.fail(e));
                }
                Step::TimedOut => return Err(self.time_out(Phase::Connect)),
                Step::Cancelled => return Ok(self.cancelled()),
            };
        self.state = SessionState::Connected;
        info!(%url, "connected");

        let result = self.exchange(&mut transport, pcm).await;
        if timeout(CLOSE_GRACE, transport.close()).await.is_err() {
            warn!(grace_ms = CLOSE_GRACE.as_millis() as u64, "close did not finish, dropping connection");
        }
        result
    }

    async fn exchange<T: FrameTransport>(&mut self, transport: &mut T, pcm: &[u8]) -> Result<Transcript> {
        let config = Arc::clone(&self.config);

        let request = SessionRequest::new(
            self.uid.clone(),
            config.audio.descriptor(),
            config.request.options(),
        );
        let body = payload::wrap_json(&request, Compression::Gzip).map_err(|e| self.fail(e))?;
        let sequence = self.take_sequence();
        let config_frame = Frame::new(
            MessageKind::ClientConfig,
            Flags::POS_SEQUENCE,
            Some(sequence),
            body,
        );
        self.send(transport, &config_frame).await?;
        debug!(sequence, "config frame sent");

        let deadline = Instant::now() + config.timeouts.config_ack();
        match bounded(&mut self.cancel, deadline, transport.recv_frame()).await {
            Step::Done(Ok(Some(raw))) => {
                if let ServerEvent::Error { code, message } = self.decode(raw)? {
                    return Err(self.server_error(code, message));
                }
            }
            Step::Done(Ok(None)) => {
                return Err(self.fail(RecognitionError::Connection(
                    "connection closed before config ack".into(),
                )))
            }
            Step::Done(Err(e)) => return Err(self.fail(e)),
            Step::TimedOut => return Err(self.time_out(Phase::ConfigAck)),
            Step::Cancelled => return Ok(self.cancelled()),
        }
        self.state = SessionState::ConfigAcked;
        debug!("config acknowledged");

        // The server assigns audio sequence numbers itself.
        let audio = payload::wrap_raw(pcm, Compression::Gzip).map_err(|e| self.fail(e))?;
        let audio_frame = Frame::new(
            MessageKind::ClientAudio,
            Flags::NEG_SEQUENCE,
            Some(AUTO_ASSIGN_SEQUENCE),
            audio,
        );
        self.send(transport, &audio_frame).await?;
        self.state = SessionState::AudioSent;
        debug!(pcm_bytes = pcm.len(), "audio frame sent");

        let budget = match self.mode {
            SessionMode::Command => config.timeouts.command(),
            SessionMode::WakeWord => config.timeouts.wake(),
        };
        let deadline = Instant::now() + budget;

        loop {
            match bounded(&mut self.cancel, deadline, transport.recv_frame()).await {
                Step::Done(Ok(Some(raw))) => match self.decode(raw)? {
                    ServerEvent::Error { code, message } => {
                        return Err(self.server_error(code, message));
                    }
                    ServerEvent::Response {
                        text,
                        is_last_package,
                        sequence,
                        ..
                    } => {
                        self.state = SessionState::Accumulating;
                        if let Some(fragment) = text.as_deref() {
                            if self.accumulator.push(fragment) {
                                debug!(?sequence, fragment, "transcript updated");
                            }
                        }

                        if self.mode == SessionMode::WakeWord
                            && self.accumulator.contains_wake_phrase(&self.wake)
                        {
                            info!("wake phrase detected");
                            return Ok(self.finish(Completion::WakePhrase));
                        }
                        if is_last_package {
                            return Ok(self.finish(Completion::FinalPackage));
                        }
                    }
                },
                Step::Done(Ok(None)) => {
                    info!("connection closed by server");
                    return Ok(self.finish(Completion::ConnectionClosed));
                }
                Step::Done(Err(e)) => {
                    warn!(error = %e, "receive failed, keeping partial transcript");
                    return Ok(self.finish(Completion::ConnectionClosed));
                }
                Step::TimedOut => {
                    if self.accumulator.latest().is_some() {
                        warn!(
                            budget_ms = budget.as_millis() as u64,
                            "receive budget exhausted, returning partial transcript"
                        );
                        let transcript = self.finish(Completion::TimedOut);
                        self.state = SessionState::TimedOut;
                        return Ok(transcript);
                    }
                    return Err(self.time_out(Phase::Exchange));
                }
                Step::Cancelled => return Ok(self.cancelled()),
            }
        }
    }

    fn take_sequence(&mut self) -> i32 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    async fn send<T: FrameTransport>(&mut self, transport: &mut T, frame: &Frame) -> Result<()> {
        match transport.send_frame(frame.encode()).await {
            Ok(()) => {
                self.metrics
                    .frames_sent
                    .inc(&[("kind", frame.kind.as_str())]);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, kind = frame.kind.as_str(), "send failed");
                Err(self.fail(e))
            }
        }
    }

    fn decode(&mut self, raw: Bytes) -> Result<ServerEvent> {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.decode_errors.inc(&[("reason", e.code())]);
                error!(error = %e, reason = e.code(), "dropping session on malformed frame");
                return Err(self.fail(e.into()));
            }
        };
        self.metrics
            .frames_received
            .inc(&[("kind", frame.kind.as_str())]);

        let interpreted = interpret(&frame);
        for anomaly in &interpreted.anomalies {
            self.metrics
                .payload_anomalies
                .inc(&[("kind", anomaly.as_str())]);
        }
        Ok(interpreted.event)
    }

    fn server_error(&mut self, code: u32, message: String) -> RecognitionError {
        self.metrics
            .server_errors
            .inc(&[("code", code.to_string().as_str())]);
        let err = RecognitionError::Protocol { code, message };
        if err.is_sequence_mismatch() {
            error!(code, "server rejected frame sequence numbering");
        } else {
            error!(code, error = %err, "server reported error");
        }
        self.fail(err)
    }

    fn fail(&mut self, err: RecognitionError) -> RecognitionError {
        self.state = SessionState::Failed;
        err
    }

    fn time_out(&mut self, phase: Phase) -> RecognitionError {
        warn!(%phase, "timed out");
        self.state = SessionState::TimedOut;
        RecognitionError::Timeout { phase }
    }

    fn cancelled(&mut self) -> Transcript {
        info!("cancelled by caller");
        self.state = SessionState::Cancelled;
        self.transcript(Completion::Cancelled)
    }

    fn finish(&mut self, completion: Completion) -> Transcript {
        self.state = SessionState::Completed;
        self.transcript(completion)
    }

    fn transcript(&self, completion: Completion) -> Transcript {
        Transcript {
            text: self.accumulator.final_text(),
            completion,
            fragments: self.accumulator.fragments(),
        }
    }
}
