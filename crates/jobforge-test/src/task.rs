//! Task assignment fixtures.
//!
//! Tasks are assigned to workers. Each unassigned task costs one hard
//! point; each assignment away from the preferred worker costs one soft
//! point.
//!
//! # Example
//!
//! ```
//! use jobforge_core::{HardSoftScore, PlanningSolution};
//! use jobforge_test::task::{Task, TaskSolution};
//!
//! let mut solution = TaskSolution::new(vec![
//!     Task::assigned(0, 0),
//!     Task::assigned(1, 0),
//!     Task::unassigned(2),
//! ]);
//! solution.evaluate();
//! assert_eq!(solution.score(), Some(HardSoftScore::of(-1, -1)));
//! ```

use jobforge_core::{HardSoftScore, PlanningSolution};

/// A task with a preferred worker and an optional assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub preferred: usize,
    pub worker: Option<usize>,
}

impl Task {
    /// Creates an unassigned task.
    pub fn unassigned(preferred: usize) -> Self {
        Self {
            preferred,
            worker: None,
        }
    }

    /// Creates a task assigned to `worker`.
    pub fn assigned(preferred: usize, worker: usize) -> Self {
        Self {
            preferred,
            worker: Some(worker),
        }
    }
}

/// Task assignment solution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskSolution {
    pub tasks: Vec<Task>,
    pub score: Option<HardSoftScore>,
}

impl TaskSolution {
    /// Creates an unscored solution over the given tasks.
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks, score: None }
    }

    /// Creates `n` unassigned tasks, each preferring worker `i % workers`.
    pub fn unassigned(n: usize, workers: usize) -> Self {
        let tasks = (0..n).map(|i| Task::unassigned(i % workers.max(1))).collect();
        Self::new(tasks)
    }

    /// Computes the score from the current assignments.
    pub fn calculate_score(&self) -> HardSoftScore {
        let mut hard = 0;
        let mut soft = 0;
        for task in &self.tasks {
            match task.worker {
                None => hard -= 1,
                Some(worker) if worker != task.preferred => soft -= 1,
                Some(_) => {}
            }
        }
        HardSoftScore::of(hard, soft)
    }

    /// Stores the computed score.
    pub fn evaluate(&mut self) {
        self.score = Some(self.calculate_score());
    }
}

impl PlanningSolution for TaskSolution {
    type Score = HardSoftScore;

    fn score(&self) -> Option<Self::Score> {
        self.score
    }

    fn set_score(&mut self, score: Option<Self::Score>) {
        self.score = score;
    }
}
