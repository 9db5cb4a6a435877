//! The solving capability a job drives.
//!
//! A [`SolvingUnit`] is the opaque optimization algorithm. The manager only
//! needs it to run to completion on one worker thread, to publish its
//! improvements through the [`SolveScope`], and to return soon after early
//! termination is requested.

use std::marker::PhantomData;
use std::sync::Arc;

use jobforge_core::{PlanningSolution, SolvingFault};

use crate::job::JobRecord;
use crate::termination::TerminationFlag;

/// A long-running optimization run over one problem.
///
/// `solve` is called exactly once, on a solving pool thread. It should poll
/// [`SolveScope::is_terminate_early_requested`] at its safe points and
/// return its best solution once the request is seen. Panics are caught and
/// reported as a [`SolvingFault`].
///
/// # Example
///
/// ```
/// use jobforge_core::{PlanningSolution, SimpleScore, SolvingFault};
/// use jobforge_manager::{SolveScope, SolvingUnit};
///
/// #[derive(Clone, Debug)]
/// struct Count { value: i64, score: Option<SimpleScore> }
///
/// impl PlanningSolution for Count {
///     type Score = SimpleScore;
///     fn score(&self) -> Option<Self::Score> { self.score }
///     fn set_score(&mut self, score: Option<Self::Score>) { self.score = score; }
/// }
///
/// struct CountUp;
///
/// impl SolvingUnit for CountUp {
///     type Problem = i64;
///     type Solution = Count;
///
///     fn solve(&mut self, target: i64, scope: &SolveScope<'_, Count>) -> Result<Count, SolvingFault> {
///         let mut best = Count { value: 0, score: None };
///         while best.value < target && !scope.is_terminate_early_requested() {
///             best.value += 1;
///             best.set_score(Some(SimpleScore::of(best.value - target)));
///             scope.update_best_solution(best.clone());
///         }
///         Ok(best)
///     }
/// }
/// ```
pub trait SolvingUnit: Send + 'static {
    /// Input handed to the unit at submission.
    type Problem: Send + 'static;
    /// Solution type the unit produces.
    type Solution: PlanningSolution;

    /// Runs the optimization and returns the final solution.
    fn solve(
        &mut self,
        problem: Self::Problem,
        scope: &SolveScope<'_, Self::Solution>,
    ) -> Result<Self::Solution, SolvingFault>;

    /// Name used in log events.
    fn unit_name(&self) -> &'static str {
        "SolvingUnit"
    }
}

/// Creates a fresh solving unit per submission.
///
/// Units usually carry run state (step counters, random generators), so the
/// manager never reuses one across jobs.
///
/// There are two common ways to provide one:
///
/// 1. [`CloneableUnitFactory`] for units that implement `Clone`
/// 2. [`ClosureUnitFactory`] with a closure that builds units
pub trait SolvingUnitFactory<U: SolvingUnit>: Send + Sync {
    /// Creates a new unit instance.
    fn create_unit(&self) -> U;
}

/// A unit factory that clones a prototype unit.
pub struct CloneableUnitFactory<U> {
    prototype: U,
}

impl<U: Clone> CloneableUnitFactory<U> {
    /// Creates a factory from a prototype unit.
    pub fn new(prototype: U) -> Self {
        Self { prototype }
    }
}

impl<U> SolvingUnitFactory<U> for CloneableUnitFactory<U>
where
    U: SolvingUnit + Clone + Sync,
{
    fn create_unit(&self) -> U {
        self.prototype.clone()
    }
}

/// A unit factory backed by a closure.
///
/// # Example
///
/// ```
/// # use jobforge_core::{PlanningSolution, SimpleScore, SolvingFault};
/// # use jobforge_manager::{SolveScope, SolvingUnit};
/// # #[derive(Clone, Debug)]
/// # struct Plan { score: Option<SimpleScore> }
/// # impl PlanningSolution for Plan {
/// #     type Score = SimpleScore;
/// #     fn score(&self) -> Option<Self::Score> { self.score }
/// #     fn set_score(&mut self, score: Option<Self::Score>) { self.score = score; }
/// # }
/// # struct Noop { seed: u64 }
/// # impl SolvingUnit for Noop {
/// #     type Problem = Plan;
/// #     type Solution = Plan;
/// #     fn solve(&mut self, p: Plan, _: &SolveScope<'_, Plan>) -> Result<Plan, SolvingFault> { Ok(p) }
/// # }
/// use jobforge_manager::{ClosureUnitFactory, SolvingUnitFactory};
///
/// let factory = ClosureUnitFactory::new(|| Noop { seed: 7 });
/// assert_eq!(factory.create_unit().seed, 7);
/// ```
pub struct ClosureUnitFactory<U, F>
where
    F: Fn() -> U + Send + Sync,
{
    factory: F,
    _marker: PhantomData<fn() -> U>,
}

impl<U, F> ClosureUnitFactory<U, F>
where
    F: Fn() -> U + Send + Sync,
{
    /// Creates a factory from a closure.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _marker: PhantomData,
        }
    }
}

impl<U, F> SolvingUnitFactory<U> for ClosureUnitFactory<U, F>
where
    U: SolvingUnit,
    F: Fn() -> U + Send + Sync,
{
    fn create_unit(&self) -> U {
        (self.factory)()
    }
}

/// Progress and cancellation context handed to [`SolvingUnit::solve`].
pub struct SolveScope<'a, S: PlanningSolution> {
    record: &'a Arc<JobRecord<S>>,
}

impl<'a, S: PlanningSolution> SolveScope<'a, S> {
    pub(crate) fn new(record: &'a Arc<JobRecord<S>>) -> Self {
        Self { record }
    }

    /// Returns the problem id of the job being solved.
    pub fn problem_id(&self) -> &str {
        self.record.problem_id()
    }

    /// Returns true once early termination has been requested.
    pub fn is_terminate_early_requested(&self) -> bool {
        self.record.is_terminate_early_requested()
    }

    /// Returns a handle to the job's termination flag, for units that hand
    /// it to helper threads.
    pub fn termination_flag(&self) -> TerminationFlag {
        self.record.termination_flag().clone()
    }

    /// Publishes a new best solution.
    ///
    /// Returns false if the candidate scores strictly worse than the current
    /// best, or is unscored while the current best is scored; the published
    /// best never regresses.
    pub fn update_best_solution(&self, solution: S) -> bool {
        self.record.update_best_solution(solution)
    }

    /// Returns a clone of the best solution published so far.
    pub fn best_solution(&self) -> Option<S> {
        self.record.best_solution()
    }

    /// Returns the score of the best solution published so far.
    pub fn best_score(&self) -> Option<S::Score> {
        self.record.best_score()
    }
}
