//! Relay sessions
//!
//! A session consumes one upstream event stream and yields phase-annotated
//! [`RelayRecord`]s. All per-session state lives in a [`SessionContext`]
//! owned by the session's stream, so concurrent sessions never observe each
//! other's phase.
//!
//! The stream is pull-driven: the next upstream chunk is only read once every
//! line of the current one has been turned into records and those records
//! have been taken by the consumer. Dropping the stream drops the upstream.

use crate::decoder::{LineDecoder, WireLine, parse_line};
use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use stagerelay_core::guard::catch_step;
use stagerelay_core::{FaultCode, PhaseLabel, RelayRecord, classify};
use stagerelay_observability::{Metrics, SessionOutcome};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use uuid::Uuid;

const COMPONENT: &str = "relay";

/// Lifecycle of one relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// Per-session relay state machine.
///
/// Lines go in one at a time through [`process_line`](Self::process_line),
/// at most one record comes out per line. Once a terminal state is reached
/// every further input is ignored.
#[derive(Debug, Default)]
pub struct SessionContext {
    phase: PhaseLabel,
    state: SessionState,
    outcome: Option<SessionOutcome>,
    /// An `event: error` header was read; the next data line is its payload
    awaiting_error_payload: bool,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PhaseLabel {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// How the session ended, once it has
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    /// Upstream accepted the session
    pub fn connected(&mut self) {
        if self.state == SessionState::Idle {
            self.state = SessionState::Streaming;
        }
    }

    /// Upstream could not be opened
    pub fn connection_failed(&mut self) {
        if self.state == SessionState::Idle {
            self.finish(SessionOutcome::ConnectionFailed);
        }
    }

    /// Dispatch one complete upstream line
    pub fn process_line(&mut self, line: &str) -> Option<RelayRecord> {
        if self.state != SessionState::Streaming {
            return None;
        }

        match parse_line(line) {
            WireLine::Blank => {
                if std::mem::take(&mut self.awaiting_error_payload) {
                    warn!("Error event without payload");
                    return Some(self.fail(FaultCode::ErrorParseFailed));
                }
                None
            }
            WireLine::Data(payload) => {
                if std::mem::take(&mut self.awaiting_error_payload) {
                    Some(self.error_payload(payload))
                } else {
                    self.data_payload(payload)
                }
            }
            WireLine::Event("done") => {
                debug!("Upstream completed");
                self.phase = PhaseLabel::Complete;
                self.finish(SessionOutcome::Completed);
                Some(RelayRecord::completed())
            }
            WireLine::Event("error") => {
                self.awaiting_error_payload = true;
                None
            }
            WireLine::Event(name) => {
                debug!("Ignoring upstream event: {}", name);
                None
            }
            WireLine::Ignored => None,
        }
    }

    /// Upstream read failed mid-stream
    pub fn read_failed(&mut self, reason: impl Display) -> Option<RelayRecord> {
        if self.state != SessionState::Streaming {
            return None;
        }
        warn!("Upstream read failed: {}", reason);
        Some(self.fail(FaultCode::StreamError))
    }

    /// Upstream ended. `discarded` is the size of an unterminated trailing line.
    ///
    /// An `event: error` header still waiting for its payload becomes an
    /// `ERROR_PARSE_FAILED` record; any other close ends the session silently.
    pub fn upstream_closed(&mut self, discarded: usize) -> Option<RelayRecord> {
        if self.state != SessionState::Streaming {
            return None;
        }
        if discarded > 0 {
            debug!("Discarding {} bytes of unterminated line", discarded);
        }
        if std::mem::take(&mut self.awaiting_error_payload) {
            warn!("Upstream closed before the error payload");
            return Some(self.fail(FaultCode::ErrorParseFailed));
        }
        warn!("Upstream closed without a terminal frame");
        self.finish(SessionOutcome::SilentClose);
        None
    }

    /// A step panicked; report it unless the session already ended
    pub fn unexpected(&mut self) -> Option<RelayRecord> {
        if self.is_terminal() {
            return None;
        }
        Some(self.fail(FaultCode::UnexpectedError))
    }

    fn data_payload(&mut self, payload: &str) -> Option<RelayRecord> {
        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Malformed data line: {}", e);
                return Some(RelayRecord::fault(FaultCode::ParseError, self.phase));
            }
        };

        if let Some(message) = value.get("message").and_then(Value::as_str) {
            self.phase = classify(message, self.phase);
            debug!("Progress: phase={}", self.phase);
            return Some(RelayRecord::progress(message, self.phase));
        }

        if value.get("error").is_some() {
            return Some(self.upstream_fault(&value));
        }

        debug!("Ignoring data line without message or error");
        None
    }

    fn error_payload(&mut self, payload: &str) -> RelayRecord {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => self.upstream_fault(&value),
            Err(e) => {
                warn!("Malformed error payload: {}", e);
                self.fail(FaultCode::ErrorParseFailed)
            }
        }
    }

    fn upstream_fault(&mut self, value: &Value) -> RelayRecord {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or(FaultCode::UnknownError.message());
        let code = value
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or(FaultCode::UnknownError.as_str());

        error!("Upstream fault: {} ({})", message, code);
        self.finish(SessionOutcome::Failed);
        RelayRecord::failure(message, code, self.phase)
    }

    fn fail(&mut self, code: FaultCode) -> RelayRecord {
        self.finish(SessionOutcome::Failed);
        RelayRecord::fault(code, self.phase)
    }

    fn finish(&mut self, outcome: SessionOutcome) {
        self.state = match outcome {
            SessionOutcome::Completed => SessionState::Completed,
            _ => SessionState::Failed,
        };
        self.outcome = Some(outcome);
        self.awaiting_error_payload = false;
    }
}

type ChunkStream = BoxStream<'static, Result<Bytes, String>>;

/// Builder for one relay session
pub struct Relay<S> {
    upstream: S,
    context: SessionContext,
    metrics: Option<Arc<Metrics>>,
    session_id: Option<Uuid>,
}

impl<S, B, E> Relay<S>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Bytes> + 'static,
    E: Display + 'static,
{
    pub fn new(upstream: S) -> Self {
        Self {
            upstream,
            context: SessionContext::new(),
            metrics: None,
            session_id: None,
        }
    }

    /// Continue from a context that tracked the connect attempt
    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Start relaying. The upstream is considered connected.
    pub fn into_stream(self) -> BoxStream<'static, RelayRecord> {
        let session_id = self.session_id.unwrap_or_else(Uuid::new_v4);
        let span = info_span!("relay_session", session_id = %session_id);

        let upstream: ChunkStream = self
            .upstream
            .map(|item| item.map(Into::<Bytes>::into).map_err(|e| e.to_string()))
            .boxed();

        let mut context = self.context;
        context.connected();
        span.in_scope(|| info!("Relay session started"));

        let session = RelaySession {
            context,
            decoder: LineDecoder::new(),
            upstream: Some(upstream),
            metrics: self.metrics,
            span,
            reported: false,
        };

        stream::unfold(session, |mut session| async move {
            let span = session.span.clone();
            let record = match catch_step(session.next_record().instrument(span)).await {
                Ok(record) => record,
                Err(_) => {
                    session.upstream = None;
                    session.context.unexpected()
                }
            };
            session.observe(record.as_ref());
            record.map(|record| (record, session))
        })
        .boxed()
    }
}

/// Relay `upstream` with default settings
pub fn relay<S, B, E>(upstream: S) -> BoxStream<'static, RelayRecord>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: Into<Bytes> + 'static,
    E: Display + 'static,
{
    Relay::new(upstream).into_stream()
}

struct RelaySession {
    context: SessionContext,
    decoder: LineDecoder,
    /// Released as soon as the session reaches a terminal state
    upstream: Option<ChunkStream>,
    metrics: Option<Arc<Metrics>>,
    span: Span,
    reported: bool,
}

impl RelaySession {
    async fn next_record(&mut self) -> Option<RelayRecord> {
        loop {
            if self.context.is_terminal() {
                self.upstream = None;
                return None;
            }

            if let Some(line) = self.decoder.next_line() {
                let record = self.context.process_line(&line);
                if self.context.is_terminal() {
                    self.upstream = None;
                }
                match record {
                    Some(record) => return Some(record),
                    None => continue,
                }
            }

            let upstream = self.upstream.as_mut()?;
            match upstream.next().await {
                Some(Ok(chunk)) => self.decoder.extend(&chunk),
                Some(Err(reason)) => {
                    self.upstream = None;
                    return self.context.read_failed(reason);
                }
                None => {
                    self.upstream = None;
                    return self.context.upstream_closed(self.decoder.pending());
                }
            }
        }
    }

    fn observe(&mut self, record: Option<&RelayRecord>) {
        if let (Some(metrics), Some(record)) = (&self.metrics, record) {
            if let Some(code) = record.code.as_deref() {
                metrics.record_emitted(COMPONENT, "error");
                // PARSE_ERROR records leave the session running
                if self.context.is_terminal() {
                    metrics.record_fault(COMPONENT, code);
                }
            } else if self.context.state() == SessionState::Completed {
                metrics.record_emitted(COMPONENT, "done");
            } else {
                metrics.record_emitted(COMPONENT, "message");
            }
        }

        if self.reported {
            return;
        }
        if let Some(outcome) = self.context.outcome() {
            self.reported = true;
            self.span
                .in_scope(|| info!("Relay session finished: {}", outcome.as_str()));
            if let Some(metrics) = &self.metrics {
                metrics.record_session_outcome(outcome);
            }
        }
    }
}
