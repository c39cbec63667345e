//! StageRelay Core Types
//!
//! This crate provides the fundamental types shared by the emitter and the relay:
//! - Upstream frames and downstream records
//! - The fault catalog
//! - Phase classification
//! - Panic containment for session steps
//! - Core error types

pub mod error;
pub mod fault;
pub mod guard;
pub mod phase;
pub mod types;

pub use error::{Error, Result};
pub use fault::FaultCode;
pub use phase::{PhaseLabel, classify};
pub use types::{COMPLETION_MESSAGE, FaultEvent, RawFrame, RelayRecord, StageMessage};
