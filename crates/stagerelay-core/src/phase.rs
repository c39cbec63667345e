//! Phase classification
//!
//! Phases are advisory labels derived from message text. Each message is
//! classified on its own: a later message may move the phase backwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse progress label attached to every downstream record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhaseLabel {
    #[default]
    #[serde(rename = "준비")]
    Preparing,
    #[serde(rename = "처리")]
    Processing,
    #[serde(rename = "분석")]
    Analyzing,
    #[serde(rename = "완료")]
    Complete,
}

impl PhaseLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Preparing => "준비",
            PhaseLabel::Processing => "처리",
            PhaseLabel::Analyzing => "분석",
            PhaseLabel::Complete => "완료",
        }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyword table in priority order
const PHASE_KEYWORDS: [(&str, PhaseLabel); 3] = [
    ("처리", PhaseLabel::Processing),
    ("분석", PhaseLabel::Analyzing),
    ("완료", PhaseLabel::Complete),
];

/// Classify a message given the phase current before it.
///
/// The first keyword in table order that occurs anywhere in `message` wins,
/// regardless of where it appears in the text. With no match the current
/// phase is kept.
pub fn classify(message: &str, current: PhaseLabel) -> PhaseLabel {
    PHASE_KEYWORDS
        .iter()
        .find(|(keyword, _)| message.contains(keyword))
        .map(|(_, phase)| *phase)
        .unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_beats_completion() {
        // "완료" appears first in the text but "처리" has priority
        let phase = classify("완료 후 처리 대기", PhaseLabel::Preparing);
        assert_eq!(phase, PhaseLabel::Processing);
    }

    #[test]
    fn test_analysis_beats_completion() {
        assert_eq!(
            classify("분석이 완료되었습니다.", PhaseLabel::Processing),
            PhaseLabel::Analyzing
        );
    }

    #[test]
    fn test_no_keyword_keeps_current() {
        assert_eq!(
            classify("주요 키워드를 추출하고 있습니다...", PhaseLabel::Processing),
            PhaseLabel::Processing
        );
        assert_eq!(classify("", PhaseLabel::Complete), PhaseLabel::Complete);
    }

    #[test]
    fn test_not_monotonic() {
        let phase = classify("처리 중", PhaseLabel::Complete);
        assert_eq!(phase, PhaseLabel::Processing);
    }

    #[test]
    fn test_deterministic() {
        for current in [
            PhaseLabel::Preparing,
            PhaseLabel::Processing,
            PhaseLabel::Analyzing,
            PhaseLabel::Complete,
        ] {
            let text = "감성 분석을 수행하고 있습니다...";
            assert_eq!(classify(text, current), classify(text, current));
        }
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&PhaseLabel::Analyzing).unwrap();
        assert_eq!(json, "\"분석\"");
        assert_eq!(PhaseLabel::default(), PhaseLabel::Preparing);
    }
}
