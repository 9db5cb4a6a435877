//! Builder for [`SolverManager`].

use std::marker::PhantomData;
use std::time::Duration;

use jobforge_config::{ResubmitPolicy, SolverManagerConfig};
use jobforge_core::ProblemId;

use crate::error::Result;
use crate::unit::{SolvingUnit, SolvingUnitFactory};

use super::SolverManager;

/// Builder for creating a [`SolverManager`].
///
/// Starts from [`SolverManagerConfig::default`]; a loaded configuration can
/// be applied with [`with_config`](Self::with_config) and then refined.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use jobforge_config::SolverManagerConfig;
/// # use jobforge_core::{PlanningSolution, SimpleScore, SolvingFault};
/// # use jobforge_manager::{SolveScope, SolvingUnit};
/// # #[derive(Clone, Debug)]
/// # struct Plan { score: Option<SimpleScore> }
/// # impl PlanningSolution for Plan {
/// #     type Score = SimpleScore;
/// #     fn score(&self) -> Option<Self::Score> { self.score }
/// #     fn set_score(&mut self, score: Option<Self::Score>) { self.score = score; }
/// # }
/// # #[derive(Clone)]
/// # struct Noop;
/// # impl SolvingUnit for Noop {
/// #     type Problem = Plan;
/// #     type Solution = Plan;
/// #     fn solve(&mut self, p: Plan, _: &SolveScope<'_, Plan>) -> Result<Plan, SolvingFault> { Ok(p) }
/// # }
/// use jobforge_manager::{CloneableUnitFactory, SolverManager};
///
/// let config = SolverManagerConfig::from_toml_str("shutdown_grace_millis = 250").unwrap();
/// let manager = SolverManager::<u64, _>::builder(CloneableUnitFactory::new(Noop))
///     .with_config(config)
///     .with_solving_threads(3)
///     .build()
///     .unwrap();
///
/// assert_eq!(manager.solving_thread_count(), 3);
/// assert_eq!(manager.config().shutdown_grace(), Duration::from_millis(250));
/// ```
pub struct SolverManagerBuilder<I: ProblemId, U: SolvingUnit> {
    factory: Box<dyn SolvingUnitFactory<U>>,
    config: SolverManagerConfig,
    _marker: PhantomData<fn() -> I>,
}

impl<I: ProblemId, U: SolvingUnit> SolverManagerBuilder<I, U> {
    pub(crate) fn new(factory: Box<dyn SolvingUnitFactory<U>>) -> Self {
        Self {
            factory,
            config: SolverManagerConfig::default(),
            _marker: PhantomData,
        }
    }

    /// Replaces the whole configuration.
    pub fn with_config(mut self, config: SolverManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a fixed solving pool size.
    pub fn with_solving_threads(mut self, count: usize) -> Self {
        self.config = self.config.with_solving_threads(count);
        self
    }

    /// Sets how long a blocking shutdown waits for in-flight work.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.config = self.config.with_shutdown_grace(grace);
        self
    }

    /// Sets what happens when a stopped job's id is submitted again.
    pub fn with_resubmit_policy(mut self, policy: ResubmitPolicy) -> Self {
        self.config = self.config.with_resubmit_policy(policy);
        self
    }

    /// Validates the configuration and starts both pools.
    pub fn build(self) -> Result<SolverManager<I, U>> {
        SolverManager::new(self.factory, self.config)
    }
}
