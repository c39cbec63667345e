//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for StageRelay:
//! - Session counts per component (emitter, relay)
//! - Records/frames emitted by kind
//! - Fault counts by code
//! - Relay session outcomes

use prometheus::{CounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector for StageRelay
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Sessions started
    pub sessions_total: CounterVec,
    /// Frames (emitter) or records (relay) produced, by kind
    pub records_total: CounterVec,
    /// Terminal faults, by code
    pub faults_total: CounterVec,
    /// How relay sessions ended
    pub session_outcomes_total: CounterVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sessions_total = CounterVec::new(
            Opts::new("stagerelay_sessions_total", "Total number of sessions started"),
            &["component"],
        )?;

        let records_total = CounterVec::new(
            Opts::new(
                "stagerelay_records_total",
                "Total number of frames or records produced",
            ),
            &["component", "kind"],
        )?;

        let faults_total = CounterVec::new(
            Opts::new("stagerelay_faults_total", "Total number of terminal faults"),
            &["component", "code"],
        )?;

        let session_outcomes_total = CounterVec::new(
            Opts::new(
                "stagerelay_session_outcomes_total",
                "Relay sessions by final state",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(sessions_total.clone()))?;
        registry.register(Box::new(records_total.clone()))?;
        registry.register(Box::new(faults_total.clone()))?;
        registry.register(Box::new(session_outcomes_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            sessions_total,
            records_total,
            faults_total,
            session_outcomes_total,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_session_started(&self, component: &str) {
        self.sessions_total.with_label_values(&[component]).inc();
    }

    /// Record one emitted unit; `kind` is one of message, done, error
    pub fn record_emitted(&self, component: &str, kind: &str) {
        self.records_total
            .with_label_values(&[component, kind])
            .inc();
    }

    pub fn record_fault(&self, component: &str, code: &str) {
        self.faults_total.with_label_values(&[component, code]).inc();
    }

    pub fn record_session_outcome(&self, outcome: SessionOutcome) {
        self.session_outcomes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }
}

/// Final state of a relay session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed,
    /// Upstream closed without a terminal frame
    SilentClose,
    /// Upstream connection never established
    ConnectionFailed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::SilentClose => "silent_close",
            Self::ConnectionFailed => "connection_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::TextEncoder;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        metrics.record_session_started("relay");
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_record_session_started() {
        let metrics = Metrics::new().unwrap();
        metrics.record_session_started("emitter");
        metrics.record_session_started("emitter");

        let value = metrics.sessions_total.with_label_values(&["emitter"]).get();
        assert_eq!(value, 2.0);
    }

    #[test]
    fn test_record_fault_and_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_fault("relay", "STREAM_ERROR");
        metrics.record_session_outcome(SessionOutcome::Failed);

        let encoded = TextEncoder::new()
            .encode_to_string(&metrics.registry().gather())
            .unwrap();
        assert!(encoded.contains("stagerelay_faults_total"));
        assert!(encoded.contains("code=\"STREAM_ERROR\""));
        assert!(encoded.contains("outcome=\"failed\""));
    }

    #[test]
    fn test_records_by_kind() {
        let metrics = Metrics::new().unwrap();
        metrics.record_emitted("relay", "message");
        metrics.record_emitted("relay", "message");
        metrics.record_emitted("relay", "done");

        assert_eq!(
            metrics
                .records_total
                .with_label_values(&["relay", "message"])
                .get(),
            2.0
        );
        assert_eq!(
            metrics
                .records_total
                .with_label_values(&["relay", "done"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_session_outcome_as_str() {
        assert_eq!(SessionOutcome::SilentClose.as_str(), "silent_close");
        assert_eq!(SessionOutcome::ConnectionFailed.as_str(), "connection_failed");
    }
}
