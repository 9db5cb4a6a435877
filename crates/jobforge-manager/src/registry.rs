//! Concurrent problem id to job record mapping.

use std::collections::HashMap;
use std::sync::Arc;

use jobforge_config::ResubmitPolicy;
use jobforge_core::{PlanningSolution, ProblemId};
use parking_lot::RwLock;

use crate::error::{Result, SolverManagerError};
use crate::job::JobRecord;

struct RegistryState<I, S: PlanningSolution> {
    jobs: HashMap<I, Arc<JobRecord<S>>>,
    closed: bool,
}

/// Registry of submitted jobs.
///
/// Holds at most one [`JobRecord`] per problem id. Registration checks for
/// an existing id and inserts within one write lock, so concurrent
/// submissions of the same id admit exactly one. Stopped records stay
/// registered until evicted, so their final state can still be queried.
pub struct JobRegistry<I: ProblemId, S: PlanningSolution> {
    state: RwLock<RegistryState<I, S>>,
}

impl<I: ProblemId, S: PlanningSolution> JobRegistry<I, S> {
    /// Creates an empty, open registry.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                jobs: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Registers `record` under `id` and launches it.
    ///
    /// `launch` runs inside the registration critical section, so a closed
    /// registry never launches and a duplicate id never displaces a live
    /// job. With [`ResubmitPolicy::ReplaceStopped`] a stopped record is
    /// replaced; an active one is always kept.
    pub fn register<F>(
        &self,
        id: I,
        record: Arc<JobRecord<S>>,
        policy: ResubmitPolicy,
        launch: F,
    ) -> Result<()>
    where
        F: FnOnce(&Arc<JobRecord<S>>),
    {
        let mut state = self.state.write();
        if state.closed {
            return Err(SolverManagerError::ShutDown);
        }
        if let Some(existing) = state.jobs.get(&id) {
            let replaceable = policy == ResubmitPolicy::ReplaceStopped && existing.is_stopped();
            if !replaceable {
                return Err(SolverManagerError::AlreadySubmitted(id.to_string()));
            }
        }
        launch(&record);
        state.jobs.insert(id, record);
        Ok(())
    }

    /// Returns the record registered under `id`.
    pub fn get(&self, id: &I) -> Option<Arc<JobRecord<S>>> {
        self.state.read().jobs.get(id).cloned()
    }

    /// Returns true if a record is registered under `id`.
    pub fn contains(&self, id: &I) -> bool {
        self.state.read().jobs.contains_key(id)
    }

    /// Removes the record under `id` regardless of its status.
    ///
    /// A removed job that is still solving keeps running; its id becomes
    /// free for a new submission.
    pub fn remove(&self, id: &I) -> Option<Arc<JobRecord<S>>> {
        self.state.write().jobs.remove(id)
    }

    /// Removes the record under `id` if it has stopped.
    ///
    /// Fails with `NotSubmitted` when absent and `StillSolving` while the
    /// job is active.
    pub fn evict(&self, id: &I) -> Result<Arc<JobRecord<S>>> {
        let mut state = self.state.write();
        match state.jobs.get(id) {
            None => Err(SolverManagerError::NotSubmitted(id.to_string())),
            Some(record) if !record.is_stopped() => {
                Err(SolverManagerError::StillSolving(id.to_string()))
            }
            Some(_) => state
                .jobs
                .remove(id)
                .ok_or_else(|| SolverManagerError::NotSubmitted(id.to_string())),
        }
    }

    /// Visits every record.
    ///
    /// The visitor runs on a snapshot taken under the read lock, outside
    /// the lock itself, and may call back into the registry.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&I, &Arc<JobRecord<S>>),
    {
        for (id, record) in self.snapshot() {
            visit(&id, &record);
        }
    }

    /// Closes the registry to new registrations and returns every record
    /// registered at that point.
    pub fn close(&self) -> Vec<(I, Arc<JobRecord<S>>)> {
        let mut state = self.state.write();
        state.closed = true;
        state
            .jobs
            .iter()
            .map(|(id, record)| (id.clone(), Arc::clone(record)))
            .collect()
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    /// Returns the registered problem ids, in no particular order.
    pub fn ids(&self) -> Vec<I> {
        self.state.read().jobs.keys().cloned().collect()
    }

    /// Returns the number of registered records.
    pub fn len(&self) -> usize {
        self.state.read().jobs.len()
    }

    /// Returns true if no record is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().jobs.is_empty()
    }

    fn snapshot(&self) -> Vec<(I, Arc<JobRecord<S>>)> {
        self.state
            .read()
            .jobs
            .iter()
            .map(|(id, record)| (id.clone(), Arc::clone(record)))
            .collect()
    }
}

impl<I: ProblemId, S: PlanningSolution> Default for JobRegistry<I, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
