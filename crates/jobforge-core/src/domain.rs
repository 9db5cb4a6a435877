//! Core domain traits

use std::fmt::{Debug, Display};
use std::hash::Hash;

use crate::score::Score;

/// Trait for planning solutions handled by the job manager.
///
/// A planning solution is both the problem definition and the (possibly
/// partial) solution. The manager never looks inside it; it only reads the
/// score to keep a job's best solution from regressing.
///
/// # Example
///
/// ```
/// use jobforge_core::{PlanningSolution, SimpleScore};
///
/// #[derive(Clone)]
/// struct NQueens {
///     rows: Vec<Option<usize>>,
///     score: Option<SimpleScore>,
/// }
///
/// impl PlanningSolution for NQueens {
///     type Score = SimpleScore;
///
///     fn score(&self) -> Option<Self::Score> {
///         self.score
///     }
///
///     fn set_score(&mut self, score: Option<Self::Score>) {
///         self.score = score;
///     }
/// }
/// ```
///
/// # Thread Safety
///
/// Solutions must be `Send + Sync`: snapshots are published by the solving
/// worker and cloned by query callers on other threads.
pub trait PlanningSolution: Clone + Send + Sync + 'static {
    /// The score type used to evaluate this solution.
    type Score: Score;

    /// Returns the current score of this solution, if calculated.
    fn score(&self) -> Option<Self::Score>;

    /// Sets the score of this solution.
    fn set_score(&mut self, score: Option<Self::Score>);
}

/// Caller-chosen identifier of one solving session.
///
/// Implemented for every type that can key a hash map, be shared across
/// threads and be printed in log lines and error messages.
///
/// ```
/// use jobforge_core::ProblemId;
///
/// fn accepts<I: ProblemId>(_id: I) {}
///
/// accepts(42_u64);
/// accepts(String::from("tenant-7"));
/// accepts("static-id");
/// ```
pub trait ProblemId: Eq + Hash + Clone + Debug + Display + Send + Sync + 'static {}

impl<T> ProblemId for T where T: Eq + Hash + Clone + Debug + Display + Send + Sync + 'static {}
