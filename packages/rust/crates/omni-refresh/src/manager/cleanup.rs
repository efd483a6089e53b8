use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::RefreshJobManager;

impl RefreshJobManager {
    /// Remove terminal jobs whose end time is older than `older_than`.
    ///
    /// Jobs without an end time are never removed, whatever their age.
    pub fn cleanup_completed(&self, older_than: Duration) -> usize {
        let now = Utc::now();
        // Nothing can be older than an out-of-range threshold.
        let Ok(older_than) = chrono::Duration::from_std(older_than) else {
            return 0;
        };
        let mut jobs = self.write_jobs();
        let before = jobs.len();

        jobs.retain(|_, job| {
            if !job.status().is_terminal() {
                return true;
            }
            match job.ended_at() {
                Some(ended_at) => now.signed_duration_since(ended_at) <= older_than,
                None => true,
            }
        });

        before - jobs.len()
    }

    /// Run `cleanup_completed(retain_for)` every `interval` until the handle is aborted.
    pub fn spawn_cleanup_loop(
        self: &Arc<Self>,
        interval: Duration,
        retain_for: Duration,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let removed = manager.cleanup_completed(retain_for);
                if removed > 0 {
                    tracing::info!(
                        removed,
                        remaining = manager.len(),
                        "removed finished refresh jobs"
                    );
                } else {
                    tracing::trace!(remaining = manager.len(), "refresh job cleanup tick");
                }
            }
        })
    }
}
