//! Cooperative early termination.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag through which early termination is requested.
///
/// The manager only ever sets the flag. Solving units poll it at their
/// own safe points and return as soon as they see it.
///
/// # Example
///
/// ```
/// use jobforge_manager::TerminationFlag;
///
/// let flag = TerminationFlag::new();
/// let seen_by_worker = flag.clone();
///
/// assert!(!seen_by_worker.is_terminate_early_requested());
/// flag.terminate_early();
/// assert!(seen_by_worker.is_terminate_early_requested());
/// ```
#[derive(Clone, Default)]
pub struct TerminationFlag {
    flag: Arc<AtomicBool>,
}

impl TerminationFlag {
    /// Creates a flag with no termination requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests early termination. Idempotent.
    pub fn terminate_early(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true if early termination has been requested.
    pub fn is_terminate_early_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Debug for TerminationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminationFlag")
            .field("terminate_early", &self.is_terminate_early_requested())
            .finish()
    }
}
