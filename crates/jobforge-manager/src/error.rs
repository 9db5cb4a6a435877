//! Error types for the solver manager.

use std::time::Duration;

use jobforge_config::ConfigError;
use thiserror::Error;

/// Errors returned by [`SolverManager`](crate::SolverManager) operations.
///
/// Duplicate and unknown ids are detected synchronously and returned to
/// the caller. Faults inside a solving unit never surface here; they are
/// routed to the job's error callback instead.
#[derive(Debug, Error)]
pub enum SolverManagerError {
    /// The problem id is registered and its record may not be replaced.
    #[error("Problem ({0}) already exists.")]
    AlreadySubmitted(String),

    /// No job is registered under the problem id.
    #[error("Problem ({0}) was not submitted.")]
    NotSubmitted(String),

    /// The job must be stopped before its record can be evicted.
    #[error("Problem ({0}) is still solving.")]
    StillSolving(String),

    /// The manager no longer accepts submissions.
    #[error("Solver manager is shut down.")]
    ShutDown,

    /// In-flight jobs did not drain within the grace period.
    #[error("Shutdown grace period of {grace:?} elapsed before in-flight jobs drained.")]
    ShutdownTimeout { grace: Duration },

    /// A worker pool could not be created.
    #[error("Failed to build {pool} pool: {message}")]
    PoolBuild { pool: &'static str, message: String },

    /// The manager configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for solver manager operations.
pub type Result<T> = std::result::Result<T, SolverManagerError>;
