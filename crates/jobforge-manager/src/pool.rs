//! Worker pools behind the solver manager.
//!
//! Two independent rayon pools are used:
//! - the solving pool runs one task per submitted job
//! - the event pool has exactly one thread and runs every listener
//!   invocation, in FIFO order
//!
//! Dropping a pool handle never blocks; rayon lets the threads finish the
//! tasks already queued and then exit.

use std::sync::Arc;
use std::time::Instant;

use jobforge_core::SolvingFault;
use parking_lot::{Condvar, Mutex};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use crate::error::{Result, SolverManagerError};

/// Fixed-size rayon pool with in-flight task accounting.
pub(crate) struct WorkerPool {
    name: &'static str,
    pool: ThreadPool,
    in_flight: Arc<InFlight>,
}

impl WorkerPool {
    pub(crate) fn new(name: &'static str, threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(move |index| format!("jobforge-{}-{}", name, index))
            .panic_handler(move |payload| {
                let fault = SolvingFault::from_panic(payload);
                error!(event = "pool_panic", pool = name, message = %fault);
            })
            .build()
            .map_err(|e| SolverManagerError::PoolBuild {
                pool: name,
                message: e.to_string(),
            })?;

        Ok(Self {
            name,
            pool,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of spawned tasks that have not finished yet, queued ones included.
    pub(crate) fn in_flight(&self) -> usize {
        *self.in_flight.count.lock()
    }

    /// Queues a task. Tasks run in submission order as threads free up.
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = InFlightGuard::enter(&self.in_flight);
        self.pool.spawn_fifo(move || {
            let _guard = guard;
            task();
        });
    }

    /// Blocks until no task is in flight or the deadline passes.
    ///
    /// Returns true if the pool drained.
    pub(crate) fn await_idle(&self, deadline: Instant) -> bool {
        let mut count = self.in_flight.count.lock();
        while *count > 0 {
            if self.in_flight.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

// Decrements on drop, so panicking tasks are accounted for as well.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        *in_flight.count.lock() += 1;
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count -= 1;
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Handle through which job records queue events on the event pool.
#[derive(Clone)]
pub(crate) struct EventDispatcher {
    pool: Arc<WorkerPool>,
}

impl EventDispatcher {
    pub(crate) fn dispatch<F>(&self, event: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(event);
    }
}

/// The solving pool and the event pool of one manager.
pub(crate) struct ExecutionPools {
    pub(crate) solving: WorkerPool,
    pub(crate) events: Arc<WorkerPool>,
}

impl ExecutionPools {
    pub(crate) fn new(solving_threads: usize) -> Result<Self> {
        Ok(Self {
            solving: WorkerPool::new("solving", solving_threads)?,
            events: Arc::new(WorkerPool::new("events", 1)?),
        })
    }

    pub(crate) fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher {
            pool: Arc::clone(&self.events),
        }
    }
}
