//! Staged progress emitter
//!
//! One emitter run is one session: it walks the configured stages in order,
//! rolling for an injected fault before each one, and ends after exactly one
//! terminal frame (done or error). A panic while producing a frame is
//! reported as an `UNEXPECTED_ERROR` frame and ends the run.

use crate::config::EmitterConfig;
use futures::stream::{self, BoxStream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stagerelay_core::guard::catch_step;
use stagerelay_core::{FaultCode, FaultEvent, RawFrame, StageMessage};
use std::sync::Arc;
use tracing::{debug, error};

/// Produces the frames of one analysis session
pub struct StageEmitter {
    config: Arc<EmitterConfig>,
    rng: StdRng,
    #[cfg(test)]
    panic_at: Option<usize>,
}

impl StageEmitter {
    /// Emitter seeded from the operating system
    pub fn new(config: Arc<EmitterConfig>) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Emitter with an explicit random source (reproducible runs)
    pub fn with_rng(config: Arc<EmitterConfig>, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            #[cfg(test)]
            panic_at: None,
        }
    }

    /// Panic while producing stage `index`
    #[cfg(test)]
    fn panicking_at(mut self, index: usize) -> Self {
        self.panic_at = Some(index);
        self
    }

    /// Start the session.
    ///
    /// The returned stream yields every frame in order and ends right after
    /// the terminal one.
    pub fn start(self) -> BoxStream<'static, RawFrame> {
        let run = EmitterRun {
            config: self.config,
            rng: self.rng,
            next_stage: 0,
            finished: false,
            #[cfg(test)]
            panic_at: self.panic_at,
        };

        stream::unfold(run, |mut run| async move {
            let frame = match catch_step(run.next_frame()).await {
                Ok(frame) => frame?,
                Err(_) => {
                    run.finished = true;
                    RawFrame::Error(FaultEvent::now(FaultCode::UnexpectedError))
                }
            };
            Some((frame, run))
        })
        .boxed()
    }
}

struct EmitterRun {
    config: Arc<EmitterConfig>,
    rng: StdRng,
    next_stage: usize,
    finished: bool,
    #[cfg(test)]
    panic_at: Option<usize>,
}

impl EmitterRun {
    async fn next_frame(&mut self) -> Option<RawFrame> {
        if self.finished {
            return None;
        }

        // Every emitted stage is followed by one interval, the last one included
        if self.next_stage > 0 {
            tokio::time::sleep(self.config.stage_interval()).await;
        }

        #[cfg(test)]
        if self.panic_at == Some(self.next_stage) {
            panic!("stage {} failed", self.next_stage);
        }

        let stages = self.config.stages();
        if self.next_stage >= stages.len() {
            self.finished = true;
            debug!("All {} stages emitted", stages.len());
            return Some(RawFrame::Done);
        }

        if self.rng.random_bool(self.config.fault_rate()) {
            self.finished = true;
            let code = FaultCode::INJECTABLE[self.rng.random_range(0..FaultCode::INJECTABLE.len())];
            let fault = FaultEvent::now(code);
            error!("Analysis error: {} ({})", fault.error, fault.code);
            return Some(RawFrame::Error(fault));
        }

        let text = stages[self.next_stage].clone();
        self.next_stage += 1;
        Some(RawFrame::Message(StageMessage::now(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_STAGES;
    use std::time::Duration;

    fn emitter(fault_rate: f64, seed: u64) -> StageEmitter {
        let config = EmitterConfig::new(fault_rate, Duration::ZERO).unwrap();
        StageEmitter::with_rng(Arc::new(config), StdRng::seed_from_u64(seed))
    }

    #[tokio::test]
    async fn test_no_faults_emits_every_stage_then_done() {
        let frames: Vec<RawFrame> = emitter(0.0, 7).start().collect().await;

        assert_eq!(frames.len(), DEFAULT_STAGES.len() + 1);
        for (frame, expected) in frames.iter().zip(DEFAULT_STAGES.iter()) {
            match frame {
                RawFrame::Message(message) => assert_eq!(message.message, *expected),
                other => panic!("expected message frame, got {:?}", other),
            }
        }
        assert_eq!(frames.last(), Some(&RawFrame::Done));
    }

    #[tokio::test]
    async fn test_certain_fault_emits_single_error() {
        let frames: Vec<RawFrame> = emitter(1.0, 7).start().collect().await;

        assert_eq!(frames.len(), 1);
        match &frames[0] {
            RawFrame::Error(fault) => {
                assert!(fault.code.is_injectable());
                assert_eq!(fault.error, fault.code.message());
            }
            other => panic!("expected error frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_frame() {
        for seed in 0..50 {
            let frames: Vec<RawFrame> = emitter(0.3, seed).start().collect().await;

            let terminal = frames.iter().filter(|f| f.is_terminal()).count();
            assert_eq!(terminal, 1, "seed {}", seed);
            assert!(frames.last().unwrap().is_terminal(), "seed {}", seed);
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_run() {
        let codes = |frames: Vec<RawFrame>| -> Vec<Option<FaultCode>> {
            frames
                .into_iter()
                .map(|f| match f {
                    RawFrame::Error(fault) => Some(fault.code),
                    _ => None,
                })
                .collect()
        };

        let first = codes(emitter(0.5, 42).start().collect().await);
        let second = codes(emitter(0.5, 42).start().collect().await);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_panic_becomes_single_unexpected_error() {
        let config = EmitterConfig::new(0.0, Duration::ZERO)
            .unwrap()
            .with_stages(["one", "two", "three"]);
        let mut frames = StageEmitter::with_rng(Arc::new(config), StdRng::seed_from_u64(1))
            .panicking_at(2)
            .start();

        for expected in ["one", "two"] {
            match frames.next().await {
                Some(RawFrame::Message(message)) => assert_eq!(message.message, expected),
                other => panic!("expected message frame, got {:?}", other),
            }
        }
        match frames.next().await {
            Some(RawFrame::Error(fault)) => {
                assert_eq!(fault.code, FaultCode::UnexpectedError);
                assert_eq!(fault.error, FaultCode::UnexpectedError.message());
            }
            other => panic!("expected error frame, got {:?}", other),
        }
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test]
    async fn test_empty_stage_list_completes_immediately() {
        let config = EmitterConfig::new(0.0, Duration::ZERO)
            .unwrap()
            .with_stages(Vec::<String>::new());
        let emitter = StageEmitter::with_rng(Arc::new(config), StdRng::seed_from_u64(1));

        let frames: Vec<RawFrame> = emitter.start().collect().await;
        assert_eq!(frames, vec![RawFrame::Done]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stages_are_spaced_by_interval() {
        let config = EmitterConfig::new(0.0, Duration::from_secs(1))
            .unwrap()
            .with_stages(["one", "two"]);
        let mut frames = StageEmitter::with_rng(Arc::new(config), StdRng::seed_from_u64(1)).start();

        let start = tokio::time::Instant::now();
        assert!(matches!(frames.next().await, Some(RawFrame::Message(_))));
        assert_eq!(start.elapsed(), Duration::ZERO);

        assert!(matches!(frames.next().await, Some(RawFrame::Message(_))));
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        assert_eq!(frames.next().await, Some(RawFrame::Done));
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        assert_eq!(frames.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sessions_advance_independently() {
        let config = Arc::new(
            EmitterConfig::new(0.0, Duration::from_secs(1))
                .unwrap()
                .with_stages(["one", "two", "three"]),
        );

        let a = StageEmitter::with_rng(config.clone(), StdRng::seed_from_u64(1));
        let b = StageEmitter::with_rng(config, StdRng::seed_from_u64(2));

        let start = tokio::time::Instant::now();
        let (fa, fb) = tokio::join!(
            a.start().collect::<Vec<_>>(),
            b.start().collect::<Vec<_>>()
        );

        assert_eq!(fa.len(), 4);
        assert_eq!(fb.len(), 4);
        // Both sessions wait concurrently: total time is one session's worth
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
