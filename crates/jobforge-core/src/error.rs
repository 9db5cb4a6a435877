//! Error types for JobForge

use std::any::Any;

use thiserror::Error;

/// A fault raised by a solving unit while it was running.
///
/// Faults are captured by the solving worker and routed to the job's error
/// callback; they never escape the worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SolvingFault {
    message: String,
}

impl SolvingFault {
    /// Creates a fault with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Creates a fault from the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("solving unit panicked: {}", s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("solving unit panicked: {}", s)
        } else {
            "solving unit panicked".to_string()
        };
        Self { message }
    }

    /// Returns the fault message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for SolvingFault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for SolvingFault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
