use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::status::RefreshStatus;

use super::{RefreshJob, duration_millis};

/// Point-in-time view of one refresh job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshJobMetrics {
    /// Job id.
    pub id: String,
    /// Status at snapshot time.
    pub status: RefreshStatus,
    /// Construction time.
    pub start_time: DateTime<Utc>,
    /// Terminal transition time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time - start_time`, or time since start while running.
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    /// Number of tracked items.
    pub item_count: usize,
    /// Items observed complete.
    pub completed_count: usize,
    /// Probe attempts so far.
    pub check_count: u64,
    /// Time of the latest probe attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    /// Latest probe error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl RefreshJobMetrics {
    /// Fraction of items complete, `1.0` for an empty job.
    #[allow(clippy::cast_precision_loss)]
    pub fn completion_ratio(&self) -> f64 {
        if self.item_count == 0 {
            return 1.0;
        }
        self.completed_count as f64 / self.item_count as f64
    }
}

impl RefreshJob {
    /// Copy of the per-item progress map.
    pub fn progress(&self) -> HashMap<String, bool> {
        self.lock_progress().clone()
    }

    /// Snapshot of status, timing, progress and the last error.
    pub fn metrics(&self) -> RefreshJobMetrics {
        let status = self.status();
        let end_time = self.ended_at();
        let duration = end_time
            .unwrap_or_else(Utc::now)
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default();

        let completed_count = self.progress().values().filter(|done| **done).count();
        let last_check = match self.last_check_ms.load(Ordering::Acquire) {
            0 => None,
            millis => DateTime::from_timestamp_millis(millis),
        };

        RefreshJobMetrics {
            id: self.id.clone(),
            status,
            start_time: self.started_at,
            end_time,
            duration,
            item_count: self.item_ids.len(),
            completed_count,
            check_count: self.check_count(),
            last_check,
            last_error: self.last_error().map(|error| error.to_string()),
        }
    }
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration_millis(*duration))
}
