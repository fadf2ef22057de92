use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Entry {
    token: CancellationToken,
    generation: u64,
}

#[derive(Debug, Default)]
struct RunningState {
    entries: HashMap<String, Entry>,
    next_generation: u64,
}

/// Cancellation handles of the recordings currently in flight, keyed by
/// schedule job id.
#[derive(Debug, Default)]
pub struct RunningRecordings {
    state: Mutex<RunningState>,
}

/// Registration of one in-flight recording. Dropping it unregisters the job.
pub struct RunningGuard<'a> {
    registry: &'a RunningRecordings,
    job_id: String,
    generation: u64,
    token: CancellationToken,
}

impl RunningGuard<'_> {
    /// Fires when the job is cancelled or `parent` fires.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.registry.lock();
        if state
            .entries
            .get(&self.job_id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            state.entries.remove(&self.job_id);
        }
    }
}

impl RunningRecordings {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunningState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `job_id` as running under a child of `parent`. A later
    /// registration for the same id replaces this one.
    pub fn start(&self, job_id: &str, parent: &CancellationToken) -> RunningGuard<'_> {
        let token = parent.child_token();
        let mut state = self.lock();
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);
        state.entries.insert(
            job_id.to_string(),
            Entry {
                token: token.clone(),
                generation,
            },
        );
        RunningGuard {
            registry: self,
            job_id: job_id.to_string(),
            generation,
            token,
        }
    }

    /// Cancels the in-flight recording of `job_id`. Returns `false` if it
    /// is not running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.lock().entries.get(job_id) {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.lock().entries.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
