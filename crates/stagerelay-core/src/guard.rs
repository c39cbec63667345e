//! Panic containment for session steps
//!
//! Sessions advance one step at a time (produce a frame, relay a chunk). A
//! panic inside a step must end only that session, so each step is polled
//! through [`catch_step`] and the caller turns a caught panic into its own
//! terminal error.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Caught panic, reduced to its message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepPanic(pub String);

impl std::fmt::Display for StepPanic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run one session step, catching a panic instead of unwinding the task
pub async fn catch_step<F: Future>(step: F) -> Result<F::Output, StepPanic> {
    AssertUnwindSafe(step).catch_unwind().await.map_err(|panic| {
        let message = panic_message(panic.as_ref()).to_string();
        tracing::error!("Panic in session step: {}", message);
        StepPanic(message)
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
