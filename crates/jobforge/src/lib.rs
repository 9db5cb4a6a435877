//! JobForge - Concurrent Solver Jobs in Rust
//!
//! Submit long-running optimization problems under a problem id, watch
//! their best solutions improve, stop them, and shut everything down
//! cleanly.
//!
//! # Example
//!
//! ```rust
//! use jobforge::prelude::*;
//!
//! // Score types are re-exported
//! let score = HardSoftScore::of(0, -100);
//! assert!(score.is_feasible());
//! assert_eq!(score.soft(), -100);
//! assert_eq!(SolverStatus::TerminatingEarly.to_string(), "TERMINATING_EARLY");
//! ```

// Score types
pub use jobforge_core::{HardSoftScore, Score, SimpleScore};

// Domain traits and faults
pub use jobforge_core::{PlanningSolution, ProblemId, SolvingFault};

// Configuration
pub use jobforge_config::{ConfigError, ResubmitPolicy, SolverManagerConfig, ThreadCount};

// Manager
pub use jobforge_manager::{
    ClosureUnitFactory, CloneableUnitFactory, JobCallbacks, JobEvent, JobSummary,
    SolveScope, SolverEventListener, SolverManager, SolverManagerBuilder, SolverManagerError,
    SolverStatus, SolvingUnit, SolvingUnitFactory, TerminationFlag,
};

/// Console output, available with the `console` feature.
#[cfg(feature = "console")]
pub mod console {
    pub use jobforge_console::{init, JobConsoleLayer, DEFAULT_DIRECTIVE};
}

pub mod prelude {
    pub use super::{HardSoftScore, Score, SimpleScore};
    pub use super::{PlanningSolution, SolvingFault};
    pub use super::{
        ClosureUnitFactory, CloneableUnitFactory, JobCallbacks, JobEvent, SolveScope,
        SolverManager, SolverManagerConfig, SolverStatus, SolvingUnit,
    };
}
