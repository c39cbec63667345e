//! StageRelay Emitter
//!
//! This crate provides the upstream producer of the analysis event stream:
//! - The staged emitter with probabilistic fault injection
//! - The `/analyze` HTTP surface that streams its frames

pub mod config;
pub mod emitter;
pub mod handler;

pub use config::EmitterConfig;
pub use emitter::StageEmitter;
pub use handler::{EmitterError, EmitterState, router};
