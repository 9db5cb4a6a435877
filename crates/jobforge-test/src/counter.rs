//! Counter fixture.
//!
//! A solution holding a single integer. Its score is the value itself, so
//! counting up is an improvement and counting down a regression.
//!
//! # Example
//!
//! ```
//! use jobforge_core::{PlanningSolution, SimpleScore};
//! use jobforge_test::CounterSolution;
//!
//! let solution = CounterSolution::new(3);
//! assert_eq!(solution.score(), Some(SimpleScore::of(3)));
//! assert_eq!(solution.next().value, 4);
//! assert_eq!(CounterSolution::unscored(3).score(), None);
//! ```

use jobforge_core::{PlanningSolution, SimpleScore};

/// Solution holding a single counter value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CounterSolution {
    pub value: i64,
    pub score: Option<SimpleScore>,
}

impl CounterSolution {
    /// Creates a solution scored by its value.
    pub fn new(value: i64) -> Self {
        Self {
            value,
            score: Some(SimpleScore::of(value)),
        }
    }

    /// Creates a solution with no score.
    pub fn unscored(value: i64) -> Self {
        Self { value, score: None }
    }

    /// Returns the scored solution one step further.
    pub fn next(&self) -> Self {
        Self::new(self.value + 1)
    }
}

impl PlanningSolution for CounterSolution {
    type Score = SimpleScore;

    fn score(&self) -> Option<Self::Score> {
        self.score
    }

    fn set_score(&mut self, score: Option<Self::Score>) {
        self.score = score;
    }
}
