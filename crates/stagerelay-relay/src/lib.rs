//! StageRelay Relay
//!
//! This crate sits between the emitter and the consumer:
//! - Upstream HTTP client
//! - Incremental line decoding of the upstream event stream
//! - Per-session phase classification and re-framing
//! - The `/analysis` HTTP surface

pub mod client;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod session;

pub use client::{HttpClientConfig, UpstreamClient, create_client};
pub use error::{RelayError, RelayResult};
pub use handler::{AnalysisRequest, RelayState, router};
pub use session::{Relay, SessionContext, SessionState, relay};
