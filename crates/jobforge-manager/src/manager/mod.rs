//! The solver manager façade.
//!
//! [`SolverManager`] runs solving units as background jobs addressed by a
//! caller-supplied problem id. Submission returns as soon as the job is
//! registered; progress is observed through queries, listeners and
//! channel subscriptions.
//!
//! # Overview
//!
//! - Jobs run on a bounded solving pool sized from the configuration.
//! - Every listener and completion callback runs on one event thread.
//! - A problem id maps to at most one job; duplicates are rejected.
//! - Stopping is cooperative: the unit observes its termination flag.
//! - Stopped jobs stay queryable until evicted.
//!
//! # Example
//!
//! ```
//! use jobforge_core::{PlanningSolution, SimpleScore, SolvingFault};
//! use jobforge_manager::{
//!     ClosureUnitFactory, JobCallbacks, SolveScope, SolverManager, SolvingUnit,
//! };
//!
//! #[derive(Clone, Debug)]
//! struct Count { value: i64, score: Option<SimpleScore> }
//!
//! impl PlanningSolution for Count {
//!     type Score = SimpleScore;
//!     fn score(&self) -> Option<Self::Score> { self.score }
//!     fn set_score(&mut self, score: Option<Self::Score>) { self.score = score; }
//! }
//!
//! struct CountUp;
//!
//! impl SolvingUnit for CountUp {
//!     type Problem = i64;
//!     type Solution = Count;
//!
//!     fn solve(&mut self, target: i64, scope: &SolveScope<'_, Count>) -> Result<Count, SolvingFault> {
//!         let mut best = Count { value: 0, score: Some(SimpleScore::of(-target)) };
//!         while best.value < target && !scope.is_terminate_early_requested() {
//!             best.value += 1;
//!             best.score = Some(SimpleScore::of(best.value - target));
//!             scope.update_best_solution(best.clone());
//!         }
//!         Ok(best)
//!     }
//! }
//!
//! let manager = SolverManager::builder(ClosureUnitFactory::new(|| CountUp))
//!     .with_solving_threads(2)
//!     .build()
//!     .unwrap();
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! manager
//!     .submit_with(
//!         "tenant-1".to_string(),
//!         10,
//!         JobCallbacks::new().on_completed(move |best| tx.send(best).unwrap()),
//!     )
//!     .unwrap();
//!
//! let best = rx.recv().unwrap().unwrap();
//! assert_eq!(best.value, 10);
//! manager.shutdown().unwrap();
//! ```

mod builder;

#[cfg(test)]
mod mod_tests;

pub use builder::SolverManagerBuilder;

use std::sync::Arc;
use std::time::Instant;

use jobforge_config::SolverManagerConfig;
use jobforge_core::{PlanningSolution, ProblemId};
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::error::{Result, SolverManagerError};
use crate::event::{listener_fn, JobCallbacks, JobEvent, SolverEventListener};
use crate::job::{JobRecord, JobSummary, SolverStatus};
use crate::pool::ExecutionPools;
use crate::registry::JobRegistry;
use crate::unit::{SolvingUnit, SolvingUnitFactory};

type Solution<U> = <U as SolvingUnit>::Solution;
type ScoreOf<U> = <Solution<U> as PlanningSolution>::Score;

/// Runs solving units as background jobs keyed by problem id.
///
/// # Type Parameters
///
/// * `I` - The problem id type
/// * `U` - The solving unit type; one fresh unit is created per submission
pub struct SolverManager<I: ProblemId, U: SolvingUnit> {
    factory: Box<dyn SolvingUnitFactory<U>>,
    registry: JobRegistry<I, Solution<U>>,
    // None once shut down.
    pools: RwLock<Option<Arc<ExecutionPools>>>,
    config: SolverManagerConfig,
}

impl<I: ProblemId, U: SolvingUnit> SolverManager<I, U> {
    /// Starts building a manager around a unit factory.
    pub fn builder<F>(factory: F) -> SolverManagerBuilder<I, U>
    where
        F: SolvingUnitFactory<U> + 'static,
    {
        SolverManagerBuilder::new(Box::new(factory))
    }

    pub(crate) fn new(
        factory: Box<dyn SolvingUnitFactory<U>>,
        config: SolverManagerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let solving_threads = config.solving_threads();
        let pools = ExecutionPools::new(solving_threads)?;

        info!(
            event = "manager_start",
            solving_threads,
            shutdown_grace_ms = config.shutdown_grace_millis,
            resubmit_policy = ?config.resubmit_policy,
        );

        Ok(Self {
            factory,
            registry: JobRegistry::new(),
            pools: RwLock::new(Some(Arc::new(pools))),
            config,
        })
    }

    /// Returns the configuration the manager was built with.
    pub fn config(&self) -> &SolverManagerConfig {
        &self.config
    }

    /// Returns the number of solving threads, or 0 once shut down.
    pub fn solving_thread_count(&self) -> usize {
        self.pools
            .read()
            .as_ref()
            .map_or(0, |pools| pools.solving.thread_count())
    }

    /// Submits a problem with no callbacks.
    pub fn submit(&self, id: I, problem: U::Problem) -> Result<()> {
        self.submit_with(id, problem, JobCallbacks::new())
    }

    /// Submits a problem for asynchronous solving.
    ///
    /// Returns once the job is registered; solving starts when a solving
    /// thread frees up. Fails with `AlreadySubmitted` when the id is taken
    /// and with `ShutDown` after shutdown has begun.
    pub fn submit_with(
        &self,
        id: I,
        problem: U::Problem,
        callbacks: JobCallbacks<Solution<U>>,
    ) -> Result<()> {
        let pools = self
            .pools
            .read()
            .clone()
            .ok_or(SolverManagerError::ShutDown)?;

        let label = id.to_string();
        let listeners = callbacks.listeners.len();
        let record = JobRecord::new(label.clone(), callbacks, pools.dispatcher());
        let unit = self.factory.create_unit();

        self.registry
            .register(id, record, self.config.resubmit_policy, |record| {
                let record = Arc::clone(record);
                pools.solving.spawn(move || record.run(unit, problem));
            })?;

        info!(
            event = "job_submitted",
            problem_id = %label,
            listeners,
            queued = pools.solving.in_flight(),
        );
        Ok(())
    }

    /// Requests early termination of a job.
    ///
    /// Returns immediately; the unit stops at its next safe point. Stopping
    /// a job that already stopped is a no-op.
    pub fn stop_solver(&self, id: &I) -> Result<()> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| SolverManagerError::NotSubmitted(id.to_string()))?;
        record.request_stop();
        Ok(())
    }

    /// Returns true if a job is registered under `id`.
    pub fn is_submitted(&self, id: &I) -> bool {
        self.registry.contains(id)
    }

    /// Returns the best solution published for `id` so far.
    pub fn best_solution(&self, id: &I) -> Option<Solution<U>> {
        self.lookup(id).and_then(|record| record.best_solution())
    }

    /// Returns the score of the best solution published for `id` so far.
    pub fn best_score(&self, id: &I) -> Option<ScoreOf<U>> {
        self.lookup(id).and_then(|record| record.best_score())
    }

    /// Returns the status of the job, or `None` if it was never submitted.
    pub fn solver_status(&self, id: &I) -> Option<SolverStatus> {
        self.lookup(id).map(|record| record.status())
    }

    /// Returns a point-in-time view of the job.
    pub fn summary(&self, id: &I) -> Option<JobSummary<ScoreOf<U>>> {
        self.lookup(id).map(|record| record.summary())
    }

    /// Returns a view of every registered job.
    pub fn summaries(&self) -> Vec<JobSummary<ScoreOf<U>>> {
        let mut summaries = Vec::with_capacity(self.registry.len());
        self.registry
            .for_each(|_, record| summaries.push(record.summary()));
        summaries
    }

    /// Returns the registered problem ids, in no particular order.
    pub fn problem_ids(&self) -> Vec<I> {
        self.registry.ids()
    }

    /// Attaches a best-solution-changed callback to a submitted job.
    ///
    /// The callback sees every later improvement; earlier ones are not
    /// replayed. Returns false if the id is unknown.
    pub fn add_listener<F>(&self, id: &I, listener: F) -> bool
    where
        F: Fn(&Solution<U>) + Send + Sync + 'static,
    {
        self.add_event_listener(id, listener_fn(listener))
    }

    /// Attaches a listener object to a submitted job.
    pub fn add_event_listener(
        &self,
        id: &I,
        listener: Arc<dyn SolverEventListener<Solution<U>>>,
    ) -> bool {
        match self.lookup(id) {
            Some(record) => {
                record.add_listener(listener);
                true
            }
            None => false,
        }
    }

    /// Opens a channel receiving the job's subsequent events.
    ///
    /// The channel ends with `Completed` and closes after it.
    pub fn subscribe(&self, id: &I) -> Option<UnboundedReceiver<JobEvent<Solution<U>>>> {
        self.lookup(id).map(|record| record.subscribe())
    }

    /// Removes a stopped job and returns its final best solution.
    pub fn evict(&self, id: &I) -> Result<Option<Solution<U>>> {
        let record = self.registry.evict(id)?;
        info!(event = "job_evicted", problem_id = %record.problem_id());
        Ok(record.best_solution())
    }

    /// Returns true once shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.pools.read().is_none()
    }

    /// Shuts down, waiting up to the configured grace period.
    ///
    /// New submissions are refused, every active job is asked to stop and
    /// queued jobs never start. Returns `ShutdownTimeout` if solving units
    /// or pending callbacks are still running when the grace period ends;
    /// they finish in the background. Idempotent.
    ///
    /// Calling this from inside a job callback always times out, since the
    /// event thread cannot drain while it waits.
    pub fn shutdown(&self) -> Result<()> {
        let Some(pools) = self.pools.write().take() else {
            return Ok(());
        };
        let grace = self.config.shutdown_grace();
        let deadline = Instant::now() + grace;
        let stopped = self.stop_all();
        info!(
            event = "shutdown_start",
            active_jobs = stopped,
            grace_ms = grace.as_millis() as u64,
        );

        let undrained = [&pools.solving, pools.events.as_ref()]
            .into_iter()
            .find(|pool| !pool.await_idle(deadline));
        if let Some(pool) = undrained {
            warn!(
                event = "shutdown_timeout",
                pool = pool.name(),
                grace_ms = grace.as_millis() as u64,
                in_flight = pools.solving.in_flight(),
                pending_events = pools.events.in_flight(),
            );
            return Err(SolverManagerError::ShutdownTimeout { grace });
        }

        info!(event = "shutdown_end", jobs = self.registry.len());
        Ok(())
    }

    /// Shuts down without waiting.
    ///
    /// Active jobs are asked to stop and finish in the background. Idempotent.
    pub fn shutdown_now(&self) {
        let Some(pools) = self.pools.write().take() else {
            return;
        };
        let stopped = self.stop_all();
        info!(
            event = "shutdown_start",
            active_jobs = stopped,
            grace_ms = 0u64,
        );
        info!(
            event = "shutdown_end",
            jobs = self.registry.len(),
            in_flight = pools.solving.in_flight(),
        );
    }

    // Closes the registry and flags every active job. Returns how many
    // jobs were still active.
    fn stop_all(&self) -> usize {
        self.registry
            .close()
            .into_iter()
            .filter(|(_, record)| record.request_stop())
            .count()
    }

    fn lookup(&self, id: &I) -> Option<Arc<JobRecord<Solution<U>>>> {
        let record = self.registry.get(id);
        if record.is_none() {
            debug!(event = "unknown_problem", problem_id = %id);
        }
        record
    }
}

impl<I: ProblemId, U: SolvingUnit> Drop for SolverManager<I, U> {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
