//! Emitter HTTP surface

use crate::config::EmitterConfig;
use crate::emitter::StageEmitter;
use axum::{
    Json, Router,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use stagerelay_core::RawFrame;
use stagerelay_observability::Metrics;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const COMPONENT: &str = "emitter";

const HEARTBEAT_MESSAGE: &str = "Hello from SSE!";

/// Analysis request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: String,
}

/// Emitter error types
#[derive(Debug, Error)]
pub enum EmitterError {
    /// Invalid request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl IntoResponse for EmitterError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            EmitterError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": "invalid_request_error",
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct EmitterState {
    pub config: Arc<EmitterConfig>,
    pub metrics: Arc<Metrics>,
}

impl EmitterState {
    pub fn new(config: EmitterConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
        }
    }
}

/// Stream one analysis session as `text/event-stream`
pub async fn analyze(
    State(state): State<EmitterState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, EmitterError> {
    let Json(req) = payload.map_err(|e| EmitterError::InvalidRequest(e.body_text()))?;
    if req.text.trim().is_empty() {
        return Err(EmitterError::InvalidRequest(
            "text must not be empty".to_string(),
        ));
    }

    info!(
        "Starting analysis session: text_len={}, fault_rate={}",
        req.text.chars().count(),
        state.config.fault_rate()
    );
    state.metrics.record_session_started(COMPONENT);

    let metrics = state.metrics.clone();
    let frames = StageEmitter::new(state.config.clone())
        .start()
        .map(move |frame| {
            match &frame {
                RawFrame::Message(_) => metrics.record_emitted(COMPONENT, "message"),
                RawFrame::Done => metrics.record_emitted(COMPONENT, "done"),
                RawFrame::Error(fault) => {
                    metrics.record_emitted(COMPONENT, "error");
                    metrics.record_fault(COMPONENT, fault.code.as_str());
                }
            }
            frame.encode().map(Bytes::from)
        });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

/// Heartbeat stream, one event per stage interval
pub async fn events(State(state): State<EmitterState>) -> impl IntoResponse {
    let interval = state.config.stage_interval();
    let ticks = stream::unfold((), move |()| async move {
        tokio::time::sleep(interval).await;
        let event = Event::default().json_data(serde_json::json!({ "message": HEARTBEAT_MESSAGE }));
        Some((event, ()))
    });

    Sse::new(ticks)
}

/// Create emitter router
pub fn router(state: EmitterState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyze/events", get(events))
        .with_state(state)
}
