//! One asynchronous refresh over a fixed set of items.
//!
//! A job owns its state machine, progress map and error slot. Every field is
//! either immutable, atomic, or behind its own lock:
//!
//! ```text
//! status      AtomicU8           (lock-free, CAS transitions)
//! ended_at    OnceLock           (written once, by the terminal CAS winner)
//! check_count AtomicU64
//! progress    Mutex<HashMap>     (never held together with last_error)
//! last_error  Mutex<Option<_>>
//! ```

mod metrics;
mod runtime;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::backoff::BackoffPolicy;
use crate::error::{ProbeError, RefreshError, Result};
use crate::probe::StatusProbe;
use crate::status::{AtomicStatus, RefreshStatus};

pub use metrics::RefreshJobMetrics;

static NEXT_JOB_SEQ: AtomicU64 = AtomicU64::new(0);

/// Asynchronous refresh job. Share it through `Arc`; every method takes `&self`.
pub struct RefreshJob {
    id: String,
    item_ids: Vec<String>,
    probe: Arc<dyn StatusProbe>,
    policy: BackoffPolicy,
    status: AtomicStatus,
    started_at: DateTime<Utc>,
    ended_at: OnceLock<DateTime<Utc>>,
    progress: Mutex<HashMap<String, bool>>,
    last_error: Mutex<Option<ProbeError>>,
    check_count: AtomicU64,
    // Epoch millis of the latest probe attempt; 0 means never.
    last_check_ms: AtomicI64,
    wait_timeout_ms: AtomicU64,
    cancelled: AtomicBool,
    cancel_token: CancellationToken,
}

impl RefreshJob {
    /// Create a `Pending` job with the default backoff policy.
    pub fn new(item_ids: Vec<String>, probe: Arc<dyn StatusProbe>) -> Self {
        Self::with_policy(item_ids, probe, BackoffPolicy::default())
    }

    /// Create a `Pending` job polling on `policy`.
    ///
    /// Duplicate ids are dropped, first occurrence wins.
    pub fn with_policy(
        item_ids: Vec<String>,
        probe: Arc<dyn StatusProbe>,
        policy: BackoffPolicy,
    ) -> Self {
        let mut progress = HashMap::with_capacity(item_ids.len());
        let mut ordered = Vec::with_capacity(item_ids.len());
        for item_id in item_ids {
            if progress.insert(item_id.clone(), false).is_none() {
                ordered.push(item_id);
            }
        }

        Self {
            id: next_job_id(),
            item_ids: ordered,
            probe,
            policy: policy.normalized(),
            status: AtomicStatus::new(RefreshStatus::Pending),
            started_at: Utc::now(),
            ended_at: OnceLock::new(),
            progress: Mutex::new(progress),
            last_error: Mutex::new(None),
            check_count: AtomicU64::new(0),
            last_check_ms: AtomicI64::new(0),
            wait_timeout_ms: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Job id for correlation and registry lookup.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Items covered by this job, in construction order.
    pub fn item_ids(&self) -> &[String] {
        &self.item_ids
    }

    /// Current status. Lock-free.
    pub fn status(&self) -> RefreshStatus {
        self.status.load()
    }

    /// Wall-clock construction time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall-clock time of the terminal transition, if reached.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at.get().copied()
    }

    /// Number of probe attempts so far.
    pub fn check_count(&self) -> u64 {
        self.check_count.load(Ordering::Acquire)
    }

    /// Whether `cancel` was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Most recent probe error, retryable or not.
    pub fn last_error(&self) -> Option<ProbeError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Polling schedule used by `wait`.
    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    fn record_error(&self, error: ProbeError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    fn lock_progress(&self) -> MutexGuard<'_, HashMap<String, bool>> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a terminal status and stamp `ended_at` if this call wins.
    fn finish(&self, to: RefreshStatus) -> std::result::Result<(), RefreshStatus> {
        let from = self.status.finish(to)?;
        let _ = self.ended_at.set(Utc::now());
        tracing::info!(
            job_id = %self.id,
            from = %from,
            status = %to,
            check_count = self.check_count(),
            "refresh job finished"
        );
        Ok(())
    }

    /// Caller-facing result for a job already in `status`.
    fn terminal_result(&self, status: RefreshStatus) -> Result<()> {
        match status {
            RefreshStatus::Failed => Err(self
                .last_error()
                .map_or(RefreshError::Failed, RefreshError::Probe)),
            RefreshStatus::Cancelled => Err(RefreshError::Cancelled),
            RefreshStatus::TimedOut => Err(RefreshError::TimedOut(Duration::from_millis(
                self.wait_timeout_ms.load(Ordering::Acquire),
            ))),
            RefreshStatus::Pending | RefreshStatus::InProgress | RefreshStatus::Completed => Ok(()),
        }
    }
}

impl std::fmt::Debug for RefreshJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshJob")
            .field("id", &self.id)
            .field("item_ids", &self.item_ids)
            .field("status", &self.status())
            .field("started_at", &self.started_at)
            .field("ended_at", &self.ended_at())
            .field("check_count", &self.check_count())
            .finish_non_exhaustive()
    }
}

fn next_job_id() -> String {
    let seq = NEXT_JOB_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("refresh-{}-{seq}", epoch_millis())
}

fn epoch_millis() -> u128 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis(),
        Err(_) => 0,
    }
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
