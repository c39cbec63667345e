//! Relay error types

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use stagerelay_core::FaultCode;
use thiserror::Error;

/// Relay result type
pub type RelayResult<T> = std::result::Result<T, RelayError>;

/// Failures raised before the downstream stream starts
#[derive(Debug, Error)]
pub enum RelayError {
    /// Invalid request format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream could not be reached
    #[error("Upstream connection failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    /// Client or router misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match self {
            RelayError::InvalidRequest(message) => {
                let body = serde_json::json!({
                    "error": {
                        "message": message,
                        "type": "invalid_request_error",
                        "code": StatusCode::BAD_REQUEST.as_u16(),
                    }
                });
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            RelayError::Connection(_) | RelayError::UpstreamStatus { .. } => {
                let code = FaultCode::ConnectionError;
                let body = serde_json::json!({
                    "error": code.message(),
                    "code": code.as_str(),
                    "timestamp": Utc::now(),
                });
                (StatusCode::BAD_GATEWAY, Json(body)).into_response()
            }
            RelayError::Config(message) => {
                let body = serde_json::json!({
                    "error": {
                        "message": message,
                        "type": "server_error",
                        "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
