//! Per-job bookkeeping.
//!
//! A [`JobRecord`] holds everything the manager knows about one submitted
//! problem: the termination flag, the published best solution, listeners,
//! subscribers and the pending completion callbacks. Records are owned by
//! the [`JobRegistry`](crate::JobRegistry); the solving unit itself is
//! owned by the one worker task that drives it.

use std::fmt::{self, Debug, Display};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use jobforge_core::{PlanningSolution, Score, SolvingFault};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::event::{CompletedCallback, ErrorCallback, JobCallbacks, JobEvent, SolverEventListener};
use crate::pool::EventDispatcher;
use crate::termination::TerminationFlag;
use crate::unit::{SolveScope, SolvingUnit};

/// Status of a submitted job.
///
/// Derived from the job's progress and its termination flag; it is never
/// stored separately. A problem id that was never submitted has no status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    /// Queued, actively solving, or awaiting delivery of its completion.
    Solving,
    /// Early termination was requested and the job has not stopped yet.
    TerminatingEarly,
    /// The unit has returned and the completion has been delivered.
    /// Absorbing.
    Stopped,
}

impl SolverStatus {
    /// Returns the status as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            SolverStatus::Solving => "SOLVING",
            SolverStatus::TerminatingEarly => "TERMINATING_EARLY",
            SolverStatus::Stopped => "STOPPED",
        }
    }

    /// Returns true until the job has stopped.
    pub fn is_active(self) -> bool {
        self != SolverStatus::Stopped
    }
}

impl Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary<Sc> {
    /// The problem id, as displayed.
    pub problem_id: String,
    /// Current status.
    pub status: SolverStatus,
    /// Score of the best solution published so far.
    pub best_score: Option<Sc>,
    /// Number of accepted best solution updates.
    pub improvement_count: u64,
    /// Whether early termination was requested.
    pub terminated_early: bool,
    /// Message of the fault the unit failed with, if any.
    pub fault: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    Queued,
    Running,
    // The unit returned; the completion is queued on the event pool.
    Finished,
    // The completion ran. Nothing is delivered after this.
    Stopped,
}

impl JobPhase {
    fn accepts_updates(self) -> bool {
        matches!(self, JobPhase::Queued | JobPhase::Running)
    }
}

/// Bookkeeping for one submitted problem.
pub struct JobRecord<S: PlanningSolution> {
    problem_id: String,
    termination: TerminationFlag,
    // Guards every transition and every event hand-off, so no update can be
    // queued after the completion.
    phase: Mutex<JobPhase>,
    best: RwLock<Option<S>>,
    fault: RwLock<Option<SolvingFault>>,
    improvement_count: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn SolverEventListener<S>>>>,
    subscribers: Mutex<Vec<UnboundedSender<JobEvent<S>>>>,
    on_completed: Mutex<Option<CompletedCallback<S>>>,
    on_error: Mutex<Option<ErrorCallback>>,
    // Released when the job finishes, so idle records keep no pool alive.
    dispatcher: Mutex<Option<EventDispatcher>>,
    submitted_at: Instant,
}

impl<S: PlanningSolution> JobRecord<S> {
    pub(crate) fn new(
        problem_id: String,
        callbacks: JobCallbacks<S>,
        dispatcher: EventDispatcher,
    ) -> Arc<Self> {
        Arc::new(Self {
            problem_id,
            termination: TerminationFlag::new(),
            phase: Mutex::new(JobPhase::Queued),
            best: RwLock::new(None),
            fault: RwLock::new(None),
            improvement_count: AtomicU64::new(0),
            listeners: RwLock::new(callbacks.listeners),
            subscribers: Mutex::new(Vec::new()),
            on_completed: Mutex::new(callbacks.on_completed),
            on_error: Mutex::new(callbacks.on_error),
            dispatcher: Mutex::new(Some(dispatcher)),
            submitted_at: Instant::now(),
        })
    }

    /// Returns the problem id this record was submitted under, as displayed.
    pub fn problem_id(&self) -> &str {
        &self.problem_id
    }

    /// Returns the current status.
    ///
    /// `Stopped` is reported only once the completion has been delivered,
    /// so every improvement event has already run by then.
    pub fn status(&self) -> SolverStatus {
        if *self.phase.lock() == JobPhase::Stopped {
            SolverStatus::Stopped
        } else if self.termination.is_terminate_early_requested() {
            SolverStatus::TerminatingEarly
        } else {
            SolverStatus::Solving
        }
    }

    /// Returns true once the completion has been delivered.
    pub fn is_stopped(&self) -> bool {
        *self.phase.lock() == JobPhase::Stopped
    }

    /// Returns true if early termination has been requested.
    pub fn is_terminate_early_requested(&self) -> bool {
        self.termination.is_terminate_early_requested()
    }

    /// Returns a clone of the best solution published so far.
    pub fn best_solution(&self) -> Option<S> {
        self.best.read().clone()
    }

    /// Returns the score of the best solution published so far.
    pub fn best_score(&self) -> Option<S::Score> {
        self.best.read().as_ref().and_then(|s| s.score())
    }

    /// Returns the fault the unit failed with, if any.
    pub fn fault(&self) -> Option<SolvingFault> {
        self.fault.read().clone()
    }

    /// Returns the number of accepted best solution updates.
    pub fn improvement_count(&self) -> u64 {
        self.improvement_count.load(Ordering::SeqCst)
    }

    /// Returns a point-in-time view of this job.
    pub fn summary(&self) -> JobSummary<S::Score> {
        JobSummary {
            problem_id: self.problem_id.clone(),
            status: self.status(),
            best_score: self.best_score(),
            improvement_count: self.improvement_count(),
            terminated_early: self.is_terminate_early_requested(),
            fault: self.fault().map(|f| f.message().to_string()),
        }
    }

    /// Requests early termination.
    ///
    /// Returns false if the job had already stopped. A queued job that sees
    /// the request never starts solving.
    pub fn request_stop(&self) -> bool {
        let started = {
            let phase = self.phase.lock();
            match *phase {
                JobPhase::Stopped => return false,
                // Already returned; only the completion is pending.
                JobPhase::Finished => return true,
                JobPhase::Queued | JobPhase::Running => {}
            }
            if self.termination.is_terminate_early_requested() {
                return true;
            }
            self.termination.terminate_early();
            *phase == JobPhase::Running
        };
        info!(
            event = "stop_requested",
            problem_id = %self.problem_id,
            started,
        );
        true
    }

    pub(crate) fn termination_flag(&self) -> &TerminationFlag {
        &self.termination
    }

    /// Appends a best-solution-changed listener.
    ///
    /// The listener sees every improvement published after this call;
    /// earlier ones are not replayed, even if still queued.
    pub(crate) fn add_listener(&self, listener: Arc<dyn SolverEventListener<S>>) {
        self.listeners.write().push(listener);
    }

    /// Opens a channel receiving this job's subsequent events.
    ///
    /// A stopped job yields a single `Completed` event.
    pub(crate) fn subscribe(&self) -> UnboundedReceiver<JobEvent<S>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let phase = self.phase.lock();
        if *phase == JobPhase::Stopped {
            let _ = tx.send(JobEvent::Completed(self.best_solution()));
        } else {
            self.subscribers.lock().push(tx);
        }
        rx
    }

    /// Publishes a new best solution and queues the change event.
    ///
    /// Rejected when the unit has returned, when the candidate scores
    /// strictly worse than the current best, or when it is unscored while
    /// the current best is scored. The event goes to the listeners and
    /// subscribers attached at this point.
    pub(crate) fn update_best_solution(self: &Arc<Self>, solution: S) -> bool {
        let candidate = solution.score();
        let phase = self.phase.lock();
        if !phase.accepts_updates() {
            drop(phase);
            debug!(
                event = "update_after_stop",
                problem_id = %self.problem_id,
            );
            return false;
        }

        let current = self.best_score();
        if regresses(current, candidate) {
            drop(phase);
            warn!(
                event = "regression_rejected",
                problem_id = %self.problem_id,
                best = %score_label(current),
                candidate = %score_label(candidate),
            );
            return false;
        }

        *self.best.write() = Some(solution.clone());
        let count = self.improvement_count.fetch_add(1, Ordering::SeqCst) + 1;

        // Queued under the phase lock, so it always precedes the completion.
        if let Some(dispatcher) = self.dispatcher.lock().as_ref() {
            let listeners = self.listeners.read().clone();
            let subscribers = {
                let mut subscribers = self.subscribers.lock();
                subscribers.retain(|tx| !tx.is_closed());
                subscribers.clone()
            };
            let record = Arc::clone(self);
            dispatcher.dispatch(move || {
                record.deliver_best_solution(&listeners, &subscribers, solution)
            });
        }
        drop(phase);

        debug!(
            event = "best_solution_changed",
            problem_id = %self.problem_id,
            improvements = count,
            score = %score_label(candidate),
        );
        true
    }

    /// Drives a solving unit to completion on the calling worker thread.
    pub(crate) fn run<U>(self: &Arc<Self>, mut unit: U, problem: U::Problem)
    where
        U: SolvingUnit<Solution = S>,
    {
        if !self.begin() {
            info!(event = "job_skipped", problem_id = %self.problem_id);
            self.finish(None);
            return;
        }

        let unit_name = unit.unit_name();
        info!(
            event = "job_started",
            problem_id = %self.problem_id,
            unit = unit_name,
            queued_ms = self.submitted_at.elapsed().as_millis() as u64,
        );

        let started = Instant::now();
        let scope = SolveScope::new(self);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| unit.solve(problem, &scope)));
        let fault = match outcome {
            Ok(Ok(solution)) => {
                self.record_final_solution(solution);
                None
            }
            Ok(Err(fault)) => Some(fault),
            Err(payload) => Some(SolvingFault::from_panic(payload)),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &fault {
            Some(fault) => error!(
                event = "job_failed",
                problem_id = %self.problem_id,
                unit = unit_name,
                duration_ms,
                message = %fault,
            ),
            None => info!(
                event = "job_stopped",
                problem_id = %self.problem_id,
                unit = unit_name,
                duration_ms,
                improvements = self.improvement_count(),
                terminated_early = self.is_terminate_early_requested(),
                score = %score_label(self.best_score()),
            ),
        }

        self.finish(fault);
    }

    // Queued -> Running, unless a stop arrived first.
    fn begin(&self) -> bool {
        let mut phase = self.phase.lock();
        if *phase != JobPhase::Queued || self.termination.is_terminate_early_requested() {
            return false;
        }
        *phase = JobPhase::Running;
        true
    }

    // The returned solution becomes the best one unless it regresses.
    fn record_final_solution(&self, solution: S) {
        let mut best = self.best.write();
        let current = best.as_ref().and_then(|s| s.score());
        if !regresses(current, solution.score()) {
            *best = Some(solution);
        }
    }

    /// Refuses further updates and queues the completion. Runs at most once.
    ///
    /// The job reads as stopped once the completion runs on the event pool.
    pub(crate) fn finish(self: &Arc<Self>, fault: Option<SolvingFault>) {
        let dispatcher = {
            let mut phase = self.phase.lock();
            if !phase.accepts_updates() {
                return;
            }
            *phase = JobPhase::Finished;
            if let Some(fault) = &fault {
                *self.fault.write() = Some(fault.clone());
            }
            self.dispatcher.lock().take()
        };

        // Updates are refused from here on, so the completion is queued last.
        let record = Arc::clone(self);
        match dispatcher {
            Some(dispatcher) => dispatcher.dispatch(move || record.deliver_completion(fault)),
            None => record.deliver_completion(fault),
        }
    }

    fn deliver_best_solution(
        &self,
        listeners: &[Arc<dyn SolverEventListener<S>>],
        subscribers: &[UnboundedSender<JobEvent<S>>],
        solution: S,
    ) {
        for listener in listeners {
            self.guarded("best_solution_listener", || {
                listener.on_best_solution_changed(&solution)
            });
        }
        for tx in subscribers {
            let _ = tx.send(JobEvent::BestSolutionChanged(solution.clone()));
        }
    }

    fn deliver_completion(&self, fault: Option<SolvingFault>) {
        let subscribers = {
            let mut phase = self.phase.lock();
            *phase = JobPhase::Stopped;
            std::mem::take(&mut *self.subscribers.lock())
        };

        if let Some(fault) = fault {
            let on_error = self.on_error.lock().take();
            match on_error {
                Some(on_error) => self.guarded("on_error", || on_error(&fault)),
                None => warn!(
                    event = "fault_unhandled",
                    problem_id = %self.problem_id,
                    message = %fault,
                ),
            }
            for tx in &subscribers {
                let _ = tx.send(JobEvent::Failed(fault.clone()));
            }
        }

        let best = self.best_solution();
        let on_completed = self.on_completed.lock().take();
        if let Some(on_completed) = on_completed {
            let final_solution = best.clone();
            self.guarded("on_completed", || on_completed(final_solution));
        }
        for tx in &subscribers {
            let _ = tx.send(JobEvent::Completed(best.clone()));
        }
    }

    // User callbacks must not take the event thread down with them.
    fn guarded<F: FnOnce()>(&self, callback: &'static str, f: F) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            let fault = SolvingFault::from_panic(payload);
            error!(
                event = "callback_panic",
                problem_id = %self.problem_id,
                callback,
                message = %fault,
            );
        }
    }
}

// An unscored candidate never replaces a scored best.
fn regresses<Sc: Score>(current: Option<Sc>, candidate: Option<Sc>) -> bool {
    match (current, candidate) {
        (Some(current), Some(candidate)) => candidate.is_worse_than(&current),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn score_label<Sc: Display>(score: Option<Sc>) -> String {
    score.map_or_else(|| "unscored".to_string(), |s| s.to_string())
}

impl<S: PlanningSolution> Debug for JobRecord<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("problem_id", &self.problem_id)
            .field("status", &self.status())
            .field("improvement_count", &self.improvement_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
