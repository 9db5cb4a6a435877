//! Test utilities for jobforge-manager
//!
//! Provides a scripted solving unit and helpers shared by the crate's test
//! modules. Solution types come from jobforge-test.

use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender};
use jobforge_core::SolvingFault;

pub use jobforge_test::{CounterSolution, TaskSolution};

use crate::manager::SolverManager;
use crate::unit::{ClosureUnitFactory, SolveScope, SolvingUnit};

/// How a [`ScriptedUnit`] behaves for one job.
pub enum Script {
    /// Publishes 1..=target, sleeping `delay` after each step. Stops early
    /// when requested.
    Count { target: i64, delay: Duration },
    /// Publishes 1, signals `started`, then spins until stopped.
    UntilStopped { started: Sender<()> },
    /// Waits for `gate` before publishing `value`. A dropped gate counts
    /// as opened.
    Gated { gate: Receiver<()>, value: i64 },
    /// Signals `started`, then ignores stop requests until `gate` opens and
    /// publishes `value`.
    Stubborn {
        started: Sender<()>,
        gate: Receiver<()>,
        value: i64,
    },
    /// Publishes each solution in order, then returns the last one.
    Publish(Vec<CounterSolution>),
    /// Publishes `published` then fails with `message`.
    Fail { published: i64, message: &'static str },
    /// Panics with `message`.
    Panic { message: &'static str },
}

/// Solving unit driven by a [`Script`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptedUnit;

impl SolvingUnit for ScriptedUnit {
    type Problem = Script;
    type Solution = CounterSolution;

    fn solve(
        &mut self,
        script: Script,
        scope: &SolveScope<'_, CounterSolution>,
    ) -> Result<CounterSolution, SolvingFault> {
        match script {
            Script::Count { target, delay } => {
                let mut best = CounterSolution::new(0);
                while best.value < target && !scope.is_terminate_early_requested() {
                    best = best.next();
                    scope.update_best_solution(best.clone());
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Ok(best)
            }
            Script::UntilStopped { started } => {
                let best = CounterSolution::new(1);
                scope.update_best_solution(best.clone());
                let _ = started.send(());
                while !scope.is_terminate_early_requested() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(best)
            }
            Script::Gated { gate, value } => {
                let _ = gate.recv();
                let best = CounterSolution::new(value);
                scope.update_best_solution(best.clone());
                Ok(best)
            }
            Script::Stubborn {
                started,
                gate,
                value,
            } => {
                let _ = started.send(());
                let _ = gate.recv();
                let best = CounterSolution::new(value);
                scope.update_best_solution(best.clone());
                Ok(best)
            }
            Script::Publish(solutions) => {
                let mut last = CounterSolution::unscored(0);
                for solution in solutions {
                    scope.update_best_solution(solution.clone());
                    last = solution;
                }
                Ok(last)
            }
            Script::Fail { published, message } => {
                scope.update_best_solution(CounterSolution::new(published));
                Err(SolvingFault::new(message))
            }
            Script::Panic { message } => panic!("{}", message),
        }
    }

    fn unit_name(&self) -> &'static str {
        "ScriptedUnit"
    }
}

/// Manager over [`ScriptedUnit`] keyed by string ids.
pub type TestManager = SolverManager<String, ScriptedUnit>;

/// Builds a manager with `threads` solving threads and a 2 second grace.
pub fn test_manager(threads: usize) -> TestManager {
    SolverManager::builder(ClosureUnitFactory::new(|| ScriptedUnit))
        .with_solving_threads(threads)
        .with_shutdown_grace(Duration::from_secs(2))
        .build()
        .expect("manager should build")
}

/// Script counting to `target` without delay.
pub fn count_to(target: i64) -> Script {
    Script::Count {
        target,
        delay: Duration::ZERO,
    }
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Default timeout for test latches.
pub const TIMEOUT: Duration = Duration::from_secs(5);
