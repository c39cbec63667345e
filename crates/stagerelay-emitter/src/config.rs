//! Emitter configuration

use stagerelay_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Fault probability used when none (or an invalid one) is configured
pub const DEFAULT_FAULT_RATE: f64 = 0.001;

/// Pause between two stages
pub const DEFAULT_STAGE_INTERVAL: Duration = Duration::from_secs(1);

/// Canned progress texts, in emission order
pub const DEFAULT_STAGES: [&str; 6] = [
    "분석을 시작합니다...",
    "텍스트를 처리하는 중입니다...",
    "주요 키워드를 추출하고 있습니다...",
    "감성 분석을 수행하고 있습니다...",
    "최종 결과를 생성합니다...",
    "분석이 완료되었습니다.",
];

/// Immutable emitter settings, shared by every session
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
    fault_rate: f64,
    stage_interval: Duration,
    stages: Arc<[String]>,
}

impl EmitterConfig {
    /// Build a config, rejecting a fault rate outside `[0, 1]`
    pub fn new(fault_rate: f64, stage_interval: Duration) -> Result<Self> {
        Self::default()
            .with_fault_rate(fault_rate)
            .map(|config| config.with_stage_interval(stage_interval))
    }

    pub fn with_fault_rate(mut self, fault_rate: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fault_rate) {
            return Err(Error::InvalidConfig(format!(
                "fault rate must be within [0, 1], got {}",
                fault_rate
            )));
        }
        self.fault_rate = fault_rate;
        Ok(self)
    }

    pub fn with_stage_interval(mut self, stage_interval: Duration) -> Self {
        self.stage_interval = stage_interval;
        self
    }

    pub fn with_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stages = stages.into_iter().map(Into::into).collect();
        self
    }

    pub fn fault_rate(&self) -> f64 {
        self.fault_rate
    }

    pub fn stage_interval(&self) -> Duration {
        self.stage_interval
    }

    pub fn stages(&self) -> &[String] {
        &self.stages
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            fault_rate: DEFAULT_FAULT_RATE,
            stage_interval: DEFAULT_STAGE_INTERVAL,
            stages: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Interpret an environment-supplied fault rate.
///
/// A fraction in `[0, 1]` is used as is; a missing, unparsable or
/// out-of-range value falls back to [`DEFAULT_FAULT_RATE`].
pub fn parse_fault_rate(value: Option<&str>) -> f64 {
    let Some(raw) = value else {
        return DEFAULT_FAULT_RATE;
    };

    match raw.trim().parse::<f64>() {
        Ok(rate) if (0.0..=1.0).contains(&rate) => rate,
        _ => {
            tracing::warn!(
                "Invalid fault rate '{}', using default {}",
                raw,
                DEFAULT_FAULT_RATE
            );
            DEFAULT_FAULT_RATE
        }
    }
}
