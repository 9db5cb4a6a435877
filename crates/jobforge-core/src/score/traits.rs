//! Core Score trait definition

use std::fmt::{Debug, Display};

/// Core trait for all score types in JobForge.
///
/// Scores represent the quality of a planning solution. Higher is better.
///
/// All score implementations must be:
/// - Immutable (cheap to copy)
/// - Thread-safe (Send + Sync), since scores are read by query callers
///   while a worker thread is solving
/// - Comparable (total ordering)
pub trait Score:
    Copy + Debug + Display + Default + Send + Sync + PartialEq + Eq + PartialOrd + Ord + 'static
{
    /// Returns true if this score represents a feasible solution.
    fn is_feasible(&self) -> bool;

    /// Returns true if this score is worse than the other score.
    fn is_worse_than(&self, other: &Self) -> bool {
        self < other
    }
}
