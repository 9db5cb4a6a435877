//! JobForge Solver Manager
//!
//! This crate runs long-running solving units as addressable background
//! jobs, keyed by a caller-supplied problem id:
//! - [`SolverManager`]: the façade callers submit, query, stop and shut down through
//! - [`JobRegistry`]: concurrent problem id to [`JobRecord`] mapping
//! - [`SolvingUnit`]: the pluggable algorithm a job drives
//! - Listener callbacks and channel subscriptions for progress events
//!
//! The optimization algorithm itself is opaque to this crate. A unit reports
//! improvements through its [`SolveScope`] and honors early termination at
//! its own safe points.
//!
//! Logging levels:
//! - **INFO**: Manager and job lifecycle (submitted, started, stopped, shutdown)
//! - **DEBUG**: Best solution changes and queries on unknown ids
//! - **WARN/ERROR**: Rejected regressions, failed jobs, shutdown timeouts

pub mod error;
pub mod event;
pub mod job;
pub mod manager;
pub mod registry;
pub mod termination;
pub mod unit;

mod pool;

#[cfg(test)]
mod test_utils;

pub use error::{Result, SolverManagerError};
pub use event::{JobCallbacks, JobEvent, SolverEventListener};
pub use job::{JobRecord, JobSummary, SolverStatus};
pub use manager::{SolverManager, SolverManagerBuilder};
pub use registry::JobRegistry;
pub use termination::TerminationFlag;
pub use unit::{
    ClosureUnitFactory, CloneableUnitFactory, SolveScope, SolvingUnit, SolvingUnitFactory,
};

pub use jobforge_config::{ResubmitPolicy, SolverManagerConfig};
pub use jobforge_core::{PlanningSolution, ProblemId, SolvingFault};
