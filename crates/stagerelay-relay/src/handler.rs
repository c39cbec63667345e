//! Relay HTTP surface

use crate::client::UpstreamClient;
use crate::error::{RelayError, RelayResult};
use crate::session::{Relay, SessionContext};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use stagerelay_core::FaultCode;
use stagerelay_observability::Metrics;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

const COMPONENT: &str = "relay";

/// Analysis request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub text: String,
}

/// Shared handler state
#[derive(Clone)]
pub struct RelayState {
    pub client: UpstreamClient,
    pub metrics: Arc<Metrics>,
}

impl RelayState {
    pub fn new(client: UpstreamClient, metrics: Arc<Metrics>) -> Self {
        Self { client, metrics }
    }
}

/// Relay one analysis session from the emitter to the caller
pub async fn analysis(
    State(state): State<RelayState>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> RelayResult<Response> {
    let Json(req) = payload.map_err(|e| RelayError::InvalidRequest(e.body_text()))?;
    if req.text.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "text must not be empty".to_string(),
        ));
    }

    let session_id = Uuid::new_v4();
    info!(
        "Relaying analysis session {}: text_len={}",
        session_id,
        req.text.chars().count()
    );
    state.metrics.record_session_started(COMPONENT);

    let mut context = SessionContext::new();
    let upstream = match state.client.connect(&req.text).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Session {} could not reach upstream: {}", session_id, e);
            context.connection_failed();
            if let Some(outcome) = context.outcome() {
                state.metrics.record_session_outcome(outcome);
            }
            state
                .metrics
                .record_fault(COMPONENT, FaultCode::ConnectionError.as_str());
            return Err(e);
        }
    };

    let records = Relay::new(upstream.bytes_stream())
        .with_context(context)
        .with_metrics(state.metrics.clone())
        .with_session_id(session_id)
        .into_stream()
        .map(|record| {
            Event::default()
                .json_data(record)
                .map_err(|e| RelayError::Config(format!("Failed to create SSE event: {}", e)))
        });

    Ok(Sse::new(records)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Create relay router
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/analysis", post(analysis))
        .with_state(state)
}
