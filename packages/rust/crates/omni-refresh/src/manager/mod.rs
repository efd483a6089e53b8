//! In-memory registry of refresh jobs.
//!
//! The registry lock guards map membership only. Job state is read after the
//! lock is released, except in cleanup, which reads the lock-free status word
//! and end time and never touches a job's mutexes.

mod cleanup;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::job::RefreshJob;
use crate::status::RefreshStatus;

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshManagerSummary {
    /// Jobs tracked.
    pub total_jobs: usize,
    /// Count by state.
    pub pending: usize,
    /// Count by state.
    pub in_progress: usize,
    /// Count by state.
    pub completed: usize,
    /// Count by state.
    pub failed: usize,
    /// Count by state.
    pub cancelled: usize,
    /// Count by state.
    pub timed_out: usize,
}

/// Registry of active and finished refresh jobs keyed by job id.
#[derive(Debug, Default)]
pub struct RefreshJobManager {
    jobs: RwLock<HashMap<String, Arc<RefreshJob>>>,
}

impl RefreshJobManager {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job`; an existing entry with the same id is replaced.
    pub fn add_job(&self, job: Arc<RefreshJob>) {
        let id = job.id().to_string();
        if self.write_jobs().insert(id.clone(), job).is_some() {
            tracing::debug!(job_id = %id, "replaced refresh job with duplicate id");
        }
    }

    /// Look up a job by id.
    pub fn get_job(&self, id: &str) -> Option<Arc<RefreshJob>> {
        self.read_jobs().get(id).cloned()
    }

    /// Snapshot of every registered job, in no particular order.
    pub fn list_jobs(&self) -> Vec<Arc<RefreshJob>> {
        self.read_jobs().values().cloned().collect()
    }

    /// Drop a job from the registry regardless of its state.
    pub fn remove_job(&self, id: &str) -> Option<Arc<RefreshJob>> {
        self.write_jobs().remove(id)
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    /// True when no jobs are registered.
    pub fn is_empty(&self) -> bool {
        self.read_jobs().is_empty()
    }

    /// Count jobs per status.
    pub fn summary(&self) -> RefreshManagerSummary {
        let jobs = self.list_jobs();
        let mut summary = RefreshManagerSummary {
            total_jobs: jobs.len(),
            ..RefreshManagerSummary::default()
        };
        for job in &jobs {
            match job.status() {
                RefreshStatus::Pending => summary.pending += 1,
                RefreshStatus::InProgress => summary.in_progress += 1,
                RefreshStatus::Completed => summary.completed += 1,
                RefreshStatus::Failed => summary.failed += 1,
                RefreshStatus::Cancelled => summary.cancelled += 1,
                RefreshStatus::TimedOut => summary.timed_out += 1,
            }
        }
        summary
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<RefreshJob>>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<RefreshJob>>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
