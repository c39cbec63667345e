//! Wire types shared by the emitter and the relay

use crate::{FaultCode, PhaseLabel, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text forwarded downstream when the upstream reports completion
pub const COMPLETION_MESSAGE: &str = "분석이 완료되었습니다.";

/// Progress message for one successful stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMessage {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl StageMessage {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Terminal fault report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub error: String,
    pub code: FaultCode,
    pub timestamp: DateTime<Utc>,
}

impl FaultEvent {
    /// Fault carrying the catalog message for `code`
    pub fn now(code: FaultCode) -> Self {
        Self {
            error: code.message().to_string(),
            code,
            timestamp: Utc::now(),
        }
    }
}

/// One frame of the upstream event stream
#[derive(Debug, Clone, PartialEq)]
pub enum RawFrame {
    Message(StageMessage),
    Done,
    Error(FaultEvent),
}

impl RawFrame {
    /// Whether the stream must end after this frame
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RawFrame::Message(_))
    }

    /// Format as an event-stream frame, blank-line terminated
    pub fn encode(&self) -> Result<String> {
        let frame = match self {
            RawFrame::Message(message) => {
                format!("data: {}\n\n", serde_json::to_string(message)?)
            }
            RawFrame::Done => "event: done\ndata: {}\n\n".to_string(),
            RawFrame::Error(fault) => {
                format!("event: error\ndata: {}\n\n", serde_json::to_string(fault)?)
            }
        };
        Ok(frame)
    }
}

/// One record of the downstream stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub phase: PhaseLabel,
    pub timestamp: DateTime<Utc>,
}

impl RelayRecord {
    /// Progress record
    pub fn progress(message: impl Into<String>, phase: PhaseLabel) -> Self {
        Self {
            message: Some(message.into()),
            error: None,
            code: None,
            phase,
            timestamp: Utc::now(),
        }
    }

    /// Error record; `code` is forwarded verbatim
    pub fn failure(error: impl Into<String>, code: impl Into<String>, phase: PhaseLabel) -> Self {
        Self {
            message: None,
            error: Some(error.into()),
            code: Some(code.into()),
            phase,
            timestamp: Utc::now(),
        }
    }

    /// Error record carrying the catalog message for `code`
    pub fn fault(code: FaultCode, phase: PhaseLabel) -> Self {
        Self::failure(code.message(), code.as_str(), phase)
    }

    /// Completion record
    pub fn completed() -> Self {
        Self::progress(COMPLETION_MESSAGE, PhaseLabel::Complete)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
