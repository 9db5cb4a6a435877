//! Tests for SolverManager submission, queries and listeners.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use jobforge_config::ResubmitPolicy;
use jobforge_core::SimpleScore;
use parking_lot::Mutex;

use super::*;
use crate::event::JobEvent;
use crate::test_utils::{
    count_to, test_manager, wait_until, CounterSolution, Script, ScriptedUnit, TIMEOUT,
};
use crate::unit::ClosureUnitFactory;

fn id(s: &str) -> String {
    s.to_string()
}

// ============================================================================
// Submission
// ============================================================================

#[test]
fn test_concurrent_distinct_submissions_all_complete() {
    let manager = Arc::new(test_manager(4));
    let (done_tx, done_rx) = channel::unbounded();
    let barrier = Arc::new(Barrier::new(16));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let manager = Arc::clone(&manager);
            let done_tx = done_tx.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let callbacks = JobCallbacks::new()
                    .on_completed(move |best: Option<CounterSolution>| {
                        done_tx.send((i, best)).unwrap()
                    });
                manager.submit_with(format!("job-{}", i), count_to(i + 1), callbacks)
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let mut finished: Vec<_> = (0..16)
        .map(|_| done_rx.recv_timeout(TIMEOUT).unwrap())
        .collect();
    finished.sort_by_key(|(i, _)| *i);
    for (i, best) in finished {
        assert_eq!(best.unwrap().value, i + 1);
        let job = format!("job-{}", i);
        assert_eq!(manager.solver_status(&job), Some(SolverStatus::Stopped));
        assert_eq!(manager.best_score(&job), Some(SimpleScore::of(i + 1)));
    }
    assert_eq!(manager.problem_ids().len(), 16);
}

#[test]
fn test_concurrent_duplicate_submissions_admit_one() {
    let manager = Arc::new(test_manager(2));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.submit(id("dup"), count_to(5))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SolverManagerError::AlreadySubmitted(id) if id == "dup")));
}

#[test]
fn test_scenario_two_listeners_then_duplicate() {
    let manager = test_manager(2);
    let finals = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = channel::bounded(1);

    let first = Arc::clone(&finals);
    let second = Arc::clone(&finals);
    let on_done = Arc::clone(&finals);
    let callbacks = JobCallbacks::new()
        .on_best_solution_changed(move |s: &CounterSolution| first.lock().push(("first", s.value)))
        .on_best_solution_changed(move |s: &CounterSolution| second.lock().push(("second", s.value)))
        .on_completed(move |best: Option<CounterSolution>| {
            let seen = on_done.lock().clone();
            done_tx.send((seen, best)).unwrap();
        });

    manager.submit_with(id("A"), count_to(1), callbacks).unwrap();
    let err = manager.submit(id("A"), count_to(1)).unwrap_err();
    assert!(matches!(err, SolverManagerError::AlreadySubmitted(ref p) if p == "A"));
    assert_eq!(err.to_string(), "Problem (A) already exists.");

    let (seen, best) = done_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(seen, vec![("first", 1), ("second", 1)]);
    assert_eq!(best.unwrap().value, 1);
}

#[test]
fn test_more_jobs_than_threads_all_complete() {
    let manager = test_manager(2);
    let (done_tx, done_rx) = channel::unbounded();

    for i in 0..10 {
        let done_tx = done_tx.clone();
        let script = Script::Count {
            target: 3,
            delay: Duration::from_millis(2),
        };
        let callbacks = JobCallbacks::new().on_completed(move |_: Option<CounterSolution>| {
            done_tx.send(i).unwrap()
        });
        manager.submit_with(format!("job-{}", i), script, callbacks).unwrap();
    }

    let mut done: Vec<i32> = (0..10)
        .map(|_| done_rx.recv_timeout(TIMEOUT).unwrap())
        .collect();
    done.sort();
    assert_eq!(done, (0..10).collect::<Vec<_>>());
    assert!(done_rx.try_recv().is_err());
}

// ============================================================================
// Listeners
// ============================================================================

#[test]
fn test_listeners_observe_equal_event_counts() {
    let manager = test_manager(1);
    let (gate_tx, gate_rx) = channel::bounded::<()>(0);
    let counts: Vec<_> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let (done_tx, done_rx) = channel::bounded(1);

    // Occupy the only solving thread so listeners attach before solving.
    manager
        .submit(id("blocker"), Script::Gated { gate: gate_rx, value: 1 })
        .unwrap();

    let mut callbacks = JobCallbacks::new()
        .on_completed(move |_: Option<CounterSolution>| done_tx.send(()).unwrap());
    for count in &counts[..2] {
        let count = Arc::clone(count);
        callbacks = callbacks.on_best_solution_changed(move |_: &CounterSolution| {
            count.fetch_add(1, Ordering::SeqCst);
        });
    }
    manager.submit_with(id("job"), count_to(50), callbacks).unwrap();

    let late = Arc::clone(&counts[2]);
    assert!(manager.add_listener(&id("job"), move |_: &CounterSolution| {
        late.fetch_add(1, Ordering::SeqCst);
    }));

    drop(gate_tx);
    done_rx.recv_timeout(TIMEOUT).unwrap();

    for count in &counts {
        assert_eq!(count.load(Ordering::SeqCst), 50);
    }
}

#[test]
fn test_add_listener_to_unknown_job() {
    let manager = test_manager(1);
    assert!(!manager.add_listener(&id("missing"), |_: &CounterSolution| {}));
}

#[test]
fn test_listener_object_receives_events() {
    struct Recorder(Mutex<Vec<i64>>);

    impl SolverEventListener<CounterSolution> for Recorder {
        fn on_best_solution_changed(&self, solution: &CounterSolution) {
            self.0.lock().push(solution.value);
        }
    }

    let manager = test_manager(1);
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let (done_tx, done_rx) = channel::bounded(1);
    let callbacks = JobCallbacks::<CounterSolution>::new()
        .with_listener(recorder.clone())
        .on_completed(move |_| done_tx.send(()).unwrap());

    manager.submit_with(id("job"), count_to(3), callbacks).unwrap();
    done_rx.recv_timeout(TIMEOUT).unwrap();

    assert_eq!(*recorder.0.lock(), vec![1, 2, 3]);
}

#[test]
fn test_callbacks_never_run_concurrently() {
    let manager = test_manager(4);
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = channel::unbounded();

    for i in 0..4 {
        let active = Arc::clone(&active);
        let overlaps = Arc::clone(&overlaps);
        let done_tx = done_tx.clone();
        let callbacks = JobCallbacks::new()
            .on_best_solution_changed(move |_: &CounterSolution| {
                if active.fetch_add(1, Ordering::SeqCst) != 0 {
                    overlaps.fetch_add(1, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_micros(200));
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .on_completed(move |_| done_tx.send(()).unwrap());
        manager.submit_with(format!("job-{}", i), count_to(20), callbacks).unwrap();
    }

    for _ in 0..4 {
        done_rx.recv_timeout(TIMEOUT).unwrap();
    }
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Stop and queries
// ============================================================================

#[test]
fn test_stop_solver_reaches_stopped_and_events_cease() {
    let manager = test_manager(1);
    let events = Arc::new(AtomicUsize::new(0));
    let (started_tx, started_rx) = channel::bounded(1);
    let (done_tx, done_rx) = channel::bounded(1);

    let counter = Arc::clone(&events);
    let callbacks = JobCallbacks::new()
        .on_best_solution_changed(move |_: &CounterSolution| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .on_completed(move |_| done_tx.send(()).unwrap());
    manager
        .submit_with(id("job"), Script::UntilStopped { started: started_tx }, callbacks)
        .unwrap();

    started_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(manager.solver_status(&id("job")), Some(SolverStatus::Solving));

    manager.stop_solver(&id("job")).unwrap();
    assert!(wait_until(TIMEOUT, || {
        manager.solver_status(&id("job")) == Some(SolverStatus::Stopped)
    }));
    done_rx.recv_timeout(TIMEOUT).unwrap();

    let observed = events.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(events.load(Ordering::SeqCst), observed);
    assert_eq!(observed, 1);

    // Stopping again is a no-op.
    manager.stop_solver(&id("job")).unwrap();
    assert_eq!(manager.solver_status(&id("job")), Some(SolverStatus::Stopped));
    assert!(manager.summary(&id("job")).unwrap().terminated_early);
}

#[test]
fn test_unknown_id_queries() {
    let manager = test_manager(1);
    let missing = id("missing");

    assert_eq!(manager.solver_status(&missing), None);
    assert!(manager.best_solution(&missing).is_none());
    assert!(manager.best_score(&missing).is_none());
    assert!(manager.summary(&missing).is_none());
    assert!(manager.subscribe(&missing).is_none());
    assert!(!manager.is_submitted(&missing));

    let err = manager.stop_solver(&missing).unwrap_err();
    assert_eq!(err.to_string(), "Problem (missing) was not submitted.");
}

#[test]
fn test_best_solution_is_readable_while_solving() {
    let manager = test_manager(1);
    let script = Script::Count {
        target: 200,
        delay: Duration::from_micros(100),
    };
    manager.submit(id("job"), script).unwrap();

    let mut last = i64::MIN;
    while manager.solver_status(&id("job")) != Some(SolverStatus::Stopped) {
        if let Some(score) = manager.best_score(&id("job")) {
            assert!(score.score() >= last, "best score regressed");
            last = score.score();
        }
    }
    assert_eq!(manager.best_solution(&id("job")).unwrap().value, 200);
}

#[test]
fn test_regressing_publication_is_ignored() {
    let manager = test_manager(1);
    let (done_tx, done_rx) = channel::bounded(1);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let callbacks = JobCallbacks::new()
        .on_best_solution_changed(move |s: &CounterSolution| log.lock().push(s.value))
        .on_completed(move |best| done_tx.send(best).unwrap());

    let script = Script::Publish(vec![
        CounterSolution::new(4),
        CounterSolution::new(2),
        CounterSolution::new(6),
    ]);
    manager.submit_with(id("job"), script, callbacks).unwrap();

    let best = done_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(best.value, 6);
    assert_eq!(*seen.lock(), vec![4, 6]);
    assert_eq!(manager.summary(&id("job")).unwrap().improvement_count, 2);
}

#[test]
fn test_slow_listener_sees_every_event_before_stopped() {
    let manager = test_manager(1);
    let events = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&events);
    let callbacks = JobCallbacks::new().on_best_solution_changed(move |_: &CounterSolution| {
        thread::sleep(Duration::from_millis(20));
        counter.fetch_add(1, Ordering::SeqCst);
    });
    manager.submit_with(id("job"), count_to(10), callbacks).unwrap();

    assert!(wait_until(TIMEOUT, || {
        manager.solver_status(&id("job")) == Some(SolverStatus::Stopped)
    }));
    assert_eq!(events.load(Ordering::SeqCst), 10);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(events.load(Ordering::SeqCst), 10);
}

#[test]
fn test_late_listener_does_not_see_earlier_improvement() {
    let manager = test_manager(1);
    let (started_tx, started_rx) = channel::bounded(1);
    let (done_tx, done_rx) = channel::bounded(1);

    let callbacks = JobCallbacks::new()
        .on_best_solution_changed(|_: &CounterSolution| thread::sleep(Duration::from_millis(100)))
        .on_completed(move |_| done_tx.send(()).unwrap());
    manager
        .submit_with(id("job"), Script::UntilStopped { started: started_tx }, callbacks)
        .unwrap();
    started_rx.recv_timeout(TIMEOUT).unwrap();

    // The only improvement is published but still being delivered.
    let late = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&late);
    assert!(manager.add_listener(&id("job"), move |_: &CounterSolution| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    manager.stop_solver(&id("job")).unwrap();

    done_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(late.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unscored_publication_keeps_scored_best() {
    let manager = test_manager(1);
    let (done_tx, done_rx) = channel::bounded(1);
    let callbacks = JobCallbacks::new().on_completed(move |best| done_tx.send(best).unwrap());

    let script = Script::Publish(vec![CounterSolution::new(5), CounterSolution::unscored(0)]);
    manager.submit_with(id("job"), script, callbacks).unwrap();

    let best = done_rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(best.value, 5);
    assert_eq!(manager.best_score(&id("job")), Some(SimpleScore::of(5)));
    assert_eq!(manager.summary(&id("job")).unwrap().improvement_count, 1);
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_fault_is_routed_to_on_error_then_on_completed() {
    let manager = test_manager(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, done_rx) = channel::bounded(1);

    let errors = Arc::clone(&order);
    let completions = Arc::clone(&order);
    let callbacks = JobCallbacks::new()
        .on_error(move |fault| errors.lock().push(fault.to_string()))
        .on_completed(move |_: Option<CounterSolution>| {
            completions.lock().push("completed".to_string());
            done_tx.send(()).unwrap();
        });
    manager
        .submit_with(id("job"), Script::Fail { published: 1, message: "bad data" }, callbacks)
        .unwrap();

    done_rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(*order.lock(), vec!["bad data", "completed"]);

    let summary = manager.summary(&id("job")).unwrap();
    assert_eq!(summary.status, SolverStatus::Stopped);
    assert_eq!(summary.fault.as_deref(), Some("bad data"));
    assert_eq!(summary.best_score, Some(SimpleScore::of(1)));
}

#[test]
fn test_panicking_unit_does_not_poison_pool() {
    let manager = test_manager(1);
    let (done_tx, done_rx) = channel::unbounded();

    let tx = done_tx.clone();
    manager
        .submit_with(
            id("panics"),
            Script::Panic { message: "unit bug" },
            JobCallbacks::new().on_completed(move |_| tx.send("panics").unwrap()),
        )
        .unwrap();
    manager
        .submit_with(
            id("healthy"),
            count_to(2),
            JobCallbacks::new().on_completed(move |_| done_tx.send("healthy").unwrap()),
        )
        .unwrap();

    let mut done = vec![
        done_rx.recv_timeout(TIMEOUT).unwrap(),
        done_rx.recv_timeout(TIMEOUT).unwrap(),
    ];
    done.sort();
    assert_eq!(done, vec!["healthy", "panics"]);
    assert_eq!(
        manager.summary(&id("panics")).unwrap().fault.as_deref(),
        Some("solving unit panicked: unit bug")
    );
    assert_eq!(manager.best_solution(&id("healthy")).unwrap().value, 2);
}

// ============================================================================
// Subscriptions, eviction and resubmission
// ============================================================================

#[tokio::test]
async fn test_subscription_ends_with_completion() {
    let manager = test_manager(1);
    let (gate_tx, gate_rx) = channel::bounded::<()>(0);
    manager
        .submit(id("job"), Script::Gated { gate: gate_rx, value: 9 })
        .unwrap();
    let mut events = manager.subscribe(&id("job")).unwrap();
    drop(gate_tx);

    let mut received = Vec::new();
    while let Some(event) = tokio::time::timeout(TIMEOUT, events.recv()).await.unwrap() {
        received.push(event);
    }

    assert_eq!(received.len(), 2);
    assert!(matches!(received[0], JobEvent::BestSolutionChanged(ref s) if s.value == 9));
    assert!(received[1].is_completed());
}

#[test]
fn test_evict_requires_stopped_job() {
    let manager = test_manager(1);
    let (started_tx, started_rx) = channel::bounded(1);
    manager
        .submit(id("job"), Script::UntilStopped { started: started_tx })
        .unwrap();
    started_rx.recv_timeout(TIMEOUT).unwrap();

    let err = manager.evict(&id("job")).unwrap_err();
    assert!(matches!(err, SolverManagerError::StillSolving(_)));

    manager.stop_solver(&id("job")).unwrap();
    assert!(wait_until(TIMEOUT, || {
        manager.solver_status(&id("job")) == Some(SolverStatus::Stopped)
    }));

    let best = manager.evict(&id("job")).unwrap();
    assert_eq!(best.unwrap().value, 1);
    assert_eq!(manager.solver_status(&id("job")), None);
    assert!(matches!(
        manager.evict(&id("job")),
        Err(SolverManagerError::NotSubmitted(_))
    ));

    // The id is free again.
    manager.submit(id("job"), count_to(1)).unwrap();
}

#[test]
fn test_stopped_job_is_retained_by_default() {
    let manager = test_manager(1);
    manager.submit(id("job"), count_to(1)).unwrap();
    assert!(wait_until(TIMEOUT, || {
        manager.solver_status(&id("job")) == Some(SolverStatus::Stopped)
    }));

    let err = manager.submit(id("job"), count_to(1)).unwrap_err();
    assert!(matches!(err, SolverManagerError::AlreadySubmitted(_)));
    assert_eq!(manager.best_solution(&id("job")).unwrap().value, 1);
}

#[test]
fn test_replace_stopped_policy_allows_resubmission() {
    let manager = SolverManager::<String, ScriptedUnit>::builder(ClosureUnitFactory::new(|| ScriptedUnit))
        .with_solving_threads(1)
        .with_resubmit_policy(ResubmitPolicy::ReplaceStopped)
        .build()
        .unwrap();

    manager.submit(id("job"), count_to(1)).unwrap();
    assert!(wait_until(TIMEOUT, || {
        manager.solver_status(&id("job")) == Some(SolverStatus::Stopped)
    }));

    manager.submit(id("job"), count_to(3)).unwrap();
    assert!(wait_until(TIMEOUT, || {
        manager.best_solution(&id("job")).map(|s| s.value) == Some(3)
    }));
    assert_eq!(manager.problem_ids(), vec![id("job")]);
}

#[test]
fn test_summaries_cover_every_job() {
    let manager = test_manager(2);
    for i in 0..3 {
        manager.submit(format!("job-{}", i), count_to(2)).unwrap();
    }
    assert!(wait_until(TIMEOUT, || {
        manager
            .summaries()
            .iter()
            .all(|s| s.status == SolverStatus::Stopped)
    }));

    let mut ids: Vec<_> = manager.summaries().into_iter().map(|s| s.problem_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["job-0", "job-1", "job-2"]);
}

#[test]
fn test_builder_rejects_zero_threads() {
    let result = SolverManager::<String, ScriptedUnit>::builder(ClosureUnitFactory::new(|| ScriptedUnit))
        .with_solving_threads(0)
        .build();
    assert!(matches!(result, Err(SolverManagerError::Config(_))));
}
