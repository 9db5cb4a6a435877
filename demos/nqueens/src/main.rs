//! N-Queens Demo
//!
//! Several N-Queens boards are solved concurrently behind one solver
//! manager. Each job runs a min-conflicts hill climber with random
//! restarts and publishes every improvement; the largest board is stopped
//! early to show cooperative termination.
//!
//! Pass a TOML or YAML configuration path as the first argument to
//! override the manager defaults.

use std::time::Duration;

use crossbeam::channel;
use jobforge::prelude::*;
use jobforge::SolverManagerError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One queen per column; `rows[c]` is the row of the queen in column `c`.
#[derive(Clone, Debug)]
pub struct NQueensSolution {
    pub n: usize,
    pub rows: Vec<usize>,
    pub score: Option<SimpleScore>,
}

impl NQueensSolution {
    /// Places every queen on row 0.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            rows: vec![0; n],
            score: None,
        }
    }

    /// Number of conflicting queen pairs.
    pub fn conflicts(&self) -> i64 {
        let mut conflicts = 0;
        for i in 0..self.n {
            for j in (i + 1)..self.n {
                if attacks(i, self.rows[i], j, self.rows[j]) {
                    conflicts += 1;
                }
            }
        }
        conflicts
    }

    // Conflicts a queen would have at (column, row).
    fn conflicts_at(&self, column: usize, row: usize) -> i64 {
        (0..self.n)
            .filter(|&other| other != column && attacks(column, row, other, self.rows[other]))
            .count() as i64
    }

    fn evaluate(&mut self) {
        self.score = Some(SimpleScore::of(-self.conflicts()));
    }

    /// Renders the board for small sizes.
    pub fn board(&self) -> String {
        let mut out = String::new();
        for row in 0..self.n {
            for column in 0..self.n {
                out.push_str(if self.rows[column] == row { "Q " } else { ". " });
            }
            out.push('\n');
        }
        out
    }
}

fn attacks(column: usize, row: usize, other_column: usize, other_row: usize) -> bool {
    row == other_row || column.abs_diff(other_column) == row.abs_diff(other_row)
}

impl PlanningSolution for NQueensSolution {
    type Score = SimpleScore;

    fn score(&self) -> Option<Self::Score> {
        self.score
    }

    fn set_score(&mut self, score: Option<Self::Score>) {
        self.score = score;
    }
}

/// Min-conflicts hill climber with random restarts.
#[derive(Clone)]
struct HillClimber {
    seed: u64,
    stall_limit: u64,
}

impl HillClimber {
    fn restart(rng: &mut ChaCha8Rng, solution: &mut NQueensSolution) {
        for row in solution.rows.iter_mut() {
            *row = rng.random_range(0..solution.n);
        }
        solution.evaluate();
    }
}

impl SolvingUnit for HillClimber {
    type Problem = usize;
    type Solution = NQueensSolution;

    fn solve(
        &mut self,
        n: usize,
        scope: &SolveScope<'_, NQueensSolution>,
    ) -> Result<NQueensSolution, SolvingFault> {
        if n == 0 {
            return Err(SolvingFault::new("board size must be positive"));
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ n as u64);
        let mut working = NQueensSolution::new(n);
        Self::restart(&mut rng, &mut working);
        scope.update_best_solution(working.clone());

        let mut stalled = 0;
        while !scope.is_terminate_early_requested() {
            let best = scope.best_score().unwrap_or(SimpleScore::ZERO);
            if best.is_feasible() {
                break;
            }

            let column = rng.random_range(0..n);
            let current = working.conflicts_at(column, working.rows[column]);
            let (row, conflicts) = (0..n)
                .map(|row| (row, working.conflicts_at(column, row)))
                .min_by_key(|&(row, conflicts)| (conflicts, row == working.rows[column]))
                .unwrap_or((working.rows[column], current));

            if conflicts < current {
                working.rows[column] = row;
                working.evaluate();
                stalled = 0;
                if working.score.is_some_and(|score| score > best) {
                    scope.update_best_solution(working.clone());
                }
            } else {
                stalled += 1;
                if stalled >= self.stall_limit {
                    Self::restart(&mut rng, &mut working);
                    stalled = 0;
                }
            }
        }

        Ok(scope.best_solution().unwrap_or(working))
    }

    fn unit_name(&self) -> &'static str {
        "HillClimber"
    }
}

fn main() -> Result<(), SolverManagerError> {
    jobforge::console::init();

    let config = match std::env::args().nth(1) {
        Some(path) => SolverManagerConfig::load(path)?,
        None => SolverManagerConfig::default(),
    };

    let manager = SolverManager::builder(CloneableUnitFactory::new(HillClimber {
        seed: 42,
        stall_limit: 200,
    }))
    .with_config(config)
    .build()?;

    let sizes = [8usize, 16, 32, 64, 256];
    let (done_tx, done_rx) = channel::unbounded();
    for &n in &sizes {
        let done_tx = done_tx.clone();
        let callbacks = JobCallbacks::new()
            .on_completed(move |best: Option<NQueensSolution>| {
                let _ = done_tx.send((n, best));
            })
            .on_error(move |fault| eprintln!("{}-queens failed: {}", n, fault));
        manager.submit_with(format!("queens-{}", n), n, callbacks)?;
    }

    std::thread::sleep(Duration::from_secs(2));
    let largest = format!("queens-{}", sizes[sizes.len() - 1]);
    if manager.solver_status(&largest).is_some_and(|s| s.is_active()) {
        println!("Stopping {} early", largest);
        manager.stop_solver(&largest)?;
    }

    for _ in &sizes {
        let Ok((n, best)) = done_rx.recv_timeout(Duration::from_secs(30)) else {
            break;
        };
        if let Some(best) = best.filter(|_| n <= 8) {
            println!("\n{}", best.board());
        }
    }

    let mut summaries = manager.summaries();
    summaries.sort_by(|a, b| a.problem_id.cmp(&b.problem_id));
    for summary in summaries {
        println!(
            "{:<12} {:<18} score {:<8} improvements {}",
            summary.problem_id,
            summary.status.as_str(),
            summary
                .best_score
                .map_or_else(|| "-".to_string(), |s| s.to_string()),
            summary.improvement_count
        );
    }

    manager.shutdown()
}
