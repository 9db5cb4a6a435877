//! Job progress events and callbacks.
//!
//! Every callback registered here is invoked on the manager's single event
//! thread, so callback code never runs concurrently with itself or with
//! another callback. For one job, events arrive in the order the solving
//! unit produced them and the completion is always the last one.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use jobforge_core::{PlanningSolution, SimpleScore};
//! use jobforge_manager::{JobCallbacks, SolverEventListener};
//!
//! #[derive(Clone, Debug)]
//! struct Plan { score: Option<SimpleScore> }
//! impl PlanningSolution for Plan {
//!     type Score = SimpleScore;
//!     fn score(&self) -> Option<Self::Score> { self.score }
//!     fn set_score(&mut self, score: Option<Self::Score>) { self.score = score; }
//! }
//!
//! struct Counter(AtomicUsize);
//! impl SolverEventListener<Plan> for Counter {
//!     fn on_best_solution_changed(&self, _solution: &Plan) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//!
//! let callbacks = JobCallbacks::<Plan>::new()
//!     .with_listener(Arc::new(Counter(AtomicUsize::new(0))))
//!     .on_completed(|best| println!("final score: {:?}", best.and_then(|p| p.score)))
//!     .on_error(|fault| eprintln!("solving failed: {}", fault));
//! ```

use std::fmt::{self, Debug};
use std::sync::Arc;

use jobforge_core::{PlanningSolution, SolvingFault};

/// Listener notified when a job publishes a new best solution.
///
/// Closures taking `&S` are accepted wherever a listener is registered;
/// implement this trait for listeners that carry their own state.
pub trait SolverEventListener<S: PlanningSolution>: Send + Sync {
    /// Called once per accepted best solution update.
    fn on_best_solution_changed(&self, solution: &S);
}

struct FnListener<F>(F);

impl<S, F> SolverEventListener<S> for FnListener<F>
where
    S: PlanningSolution,
    F: Fn(&S) + Send + Sync,
{
    fn on_best_solution_changed(&self, solution: &S) {
        (self.0)(solution)
    }
}

/// Wraps a closure as a shared listener.
pub(crate) fn listener_fn<S, F>(f: F) -> Arc<dyn SolverEventListener<S>>
where
    S: PlanningSolution,
    F: Fn(&S) + Send + Sync + 'static,
{
    Arc::new(FnListener(f))
}

/// Event delivered to channel subscribers of a job.
#[derive(Debug, Clone)]
pub enum JobEvent<S> {
    /// A new best solution was published.
    BestSolutionChanged(S),
    /// The solving unit failed. Always followed by `Completed`.
    Failed(SolvingFault),
    /// The job stopped; carries the final best solution, if any.
    Completed(Option<S>),
}

impl<S> JobEvent<S> {
    /// Returns true for the terminal `Completed` event.
    pub fn is_completed(&self) -> bool {
        matches!(self, JobEvent::Completed(_))
    }
}

pub(crate) type CompletedCallback<S> = Box<dyn FnOnce(Option<S>) + Send>;
pub(crate) type ErrorCallback = Box<dyn FnOnce(&SolvingFault) + Send>;

/// Callbacks attached to a job at submission.
///
/// All callbacks are optional. `on_completed` fires exactly once, after any
/// `on_error`, with the final best solution (absent if the job never
/// produced one).
pub struct JobCallbacks<S: PlanningSolution> {
    pub(crate) listeners: Vec<Arc<dyn SolverEventListener<S>>>,
    pub(crate) on_completed: Option<CompletedCallback<S>>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl<S: PlanningSolution> JobCallbacks<S> {
    /// Creates an empty callback set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            on_completed: None,
            on_error: None,
        }
    }

    /// Adds a best-solution-changed callback.
    pub fn on_best_solution_changed<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        self.listeners.push(listener_fn(f));
        self
    }

    /// Adds a best-solution-changed listener object.
    pub fn with_listener(mut self, listener: Arc<dyn SolverEventListener<S>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Sets the completion callback.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Option<S>) + Send + 'static,
    {
        self.on_completed = Some(Box::new(f));
        self
    }

    /// Sets the fault callback.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&SolvingFault) + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl<S: PlanningSolution> Default for JobCallbacks<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PlanningSolution> Debug for JobCallbacks<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCallbacks")
            .field("listeners", &self.listeners.len())
            .field("on_completed", &self.on_completed.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
