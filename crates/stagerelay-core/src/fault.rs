//! Fault catalog
//!
//! Every terminal error carries one of these codes. The first five are the
//! faults the emitter injects; the rest are produced by the relay or by the
//! panic guard on either side.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code attached to a terminal fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultCode {
    // Injected by the emitter
    ServerOverload,
    ModelLoadFailed,
    OutOfMemory,
    NetworkUnstable,
    ModelException,

    // Produced while relaying
    UnexpectedError,
    ConnectionError,
    StreamError,
    ParseError,
    UnknownError,
    ErrorParseFailed,
}

impl FaultCode {
    /// Faults the emitter picks from, uniformly
    pub const INJECTABLE: [FaultCode; 5] = [
        FaultCode::ServerOverload,
        FaultCode::ModelLoadFailed,
        FaultCode::OutOfMemory,
        FaultCode::NetworkUnstable,
        FaultCode::ModelException,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::ServerOverload => "SERVER_OVERLOAD",
            FaultCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            FaultCode::OutOfMemory => "OUT_OF_MEMORY",
            FaultCode::NetworkUnstable => "NETWORK_UNSTABLE",
            FaultCode::ModelException => "MODEL_EXCEPTION",
            FaultCode::UnexpectedError => "UNEXPECTED_ERROR",
            FaultCode::ConnectionError => "CONNECTION_ERROR",
            FaultCode::StreamError => "STREAM_ERROR",
            FaultCode::ParseError => "PARSE_ERROR",
            FaultCode::UnknownError => "UNKNOWN_ERROR",
            FaultCode::ErrorParseFailed => "ERROR_PARSE_FAILED",
        }
    }

    /// Human-readable message reported alongside the code
    pub fn message(&self) -> &'static str {
        match self {
            FaultCode::ServerOverload => "서버 과부하로 인한 처리 지연",
            FaultCode::ModelLoadFailed => "텍스트 분석 모델 로딩 실패",
            FaultCode::OutOfMemory => "메모리 부족으로 인한 처리 중단",
            FaultCode::NetworkUnstable => "네트워크 연결 불안정",
            FaultCode::ModelException => "분석 모델 예외 발생",
            FaultCode::UnexpectedError => "분석 중 예기치 않은 오류가 발생했습니다.",
            FaultCode::ConnectionError => "분석 서버에 연결할 수 없습니다.",
            FaultCode::StreamError => "분석 스트림을 읽는 중 오류가 발생했습니다.",
            FaultCode::ParseError => "분석 데이터를 해석할 수 없습니다.",
            FaultCode::UnknownError | FaultCode::ErrorParseFailed => {
                "알 수 없는 오류가 발생했습니다."
            }
        }
    }

    pub fn is_injectable(&self) -> bool {
        Self::INJECTABLE.contains(self)
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_as_str() {
        for code in [
            FaultCode::ServerOverload,
            FaultCode::ConnectionError,
            FaultCode::ErrorParseFailed,
        ] {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, serde_json::Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn test_injectable_catalog() {
        assert_eq!(FaultCode::INJECTABLE.len(), 5);
        assert!(FaultCode::OutOfMemory.is_injectable());
        assert!(!FaultCode::StreamError.is_injectable());
        assert!(!FaultCode::UnexpectedError.is_injectable());
    }

    #[test]
    fn test_display() {
        assert_eq!(FaultCode::NetworkUnstable.to_string(), "NETWORK_UNSTABLE");
    }
}
