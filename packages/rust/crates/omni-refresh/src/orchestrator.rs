//! Entry point: request a provider-side refresh, then track it as a job.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RefreshError, Result};
use crate::job::RefreshJob;
use crate::manager::RefreshJobManager;
use crate::probe::StatusProbe;
use crate::settings::RefreshSettings;

/// Capability that asks the provider to start refreshing items.
#[async_trait]
pub trait RefreshRequester: Send + Sync {
    /// Ask the provider to refresh `item_ids`.
    async fn request_refresh(&self, item_ids: &[String]) -> Result<()>;

    /// Every item the provider can refresh; used when no ids are given.
    async fn list_item_ids(&self) -> Result<Vec<String>>;
}

/// Starts refreshes and hands back registered jobs.
pub struct RefreshOrchestrator {
    requester: Arc<dyn RefreshRequester>,
    probe: Arc<dyn StatusProbe>,
    manager: Arc<RefreshJobManager>,
    settings: RefreshSettings,
}

impl RefreshOrchestrator {
    /// Build an orchestrator over the given capabilities.
    pub fn new(
        requester: Arc<dyn RefreshRequester>,
        probe: Arc<dyn StatusProbe>,
        manager: Arc<RefreshJobManager>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            requester,
            probe,
            manager,
            settings,
        }
    }

    /// Registry the orchestrator adds jobs to.
    pub fn manager(&self) -> &Arc<RefreshJobManager> {
        &self.manager
    }

    /// Request a refresh and register a `Pending` job tracking it.
    ///
    /// An empty `item_ids` refreshes every item the requester lists.
    pub async fn start(&self, item_ids: Vec<String>) -> Result<Arc<RefreshJob>> {
        let item_ids = if item_ids.is_empty() {
            self.requester.list_item_ids().await?
        } else {
            item_ids
        };

        self.requester.request_refresh(&item_ids).await?;

        let job = Arc::new(RefreshJob::with_policy(
            item_ids,
            Arc::clone(&self.probe),
            self.settings.backoff_policy(),
        ));
        self.manager.add_job(Arc::clone(&job));
        tracing::info!(
            job_id = %job.id(),
            items = job.item_ids().len(),
            "refresh requested"
        );
        Ok(job)
    }

    /// `start`, then `wait` with `timeout` or the configured default.
    pub async fn refresh_and_wait(
        &self,
        item_ids: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Arc<RefreshJob>> {
        let job = self.start(item_ids).await?;
        job.wait(timeout.unwrap_or_else(|| self.settings.wait_timeout()))
            .await?;
        Ok(job)
    }

    /// Cancel a registered job by id.
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let job = self
            .manager
            .get_job(job_id)
            .ok_or_else(|| RefreshError::NotFound(job_id.to_string()))?;
        job.cancel();
        Ok(())
    }

    /// One-shot check without a job: false if any item still reports a sync.
    ///
    /// An empty `item_ids` checks every item the requester lists.
    pub async fn is_refresh_complete(&self, item_ids: &[String]) -> Result<bool> {
        let item_ids = if item_ids.is_empty() {
            self.requester.list_item_ids().await?
        } else {
            item_ids.to_vec()
        };
        let signals = self.probe.check(&item_ids).await?;
        let wanted: HashSet<&str> = item_ids.iter().map(String::as_str).collect();
        Ok(signals
            .iter()
            .filter(|signal| wanted.contains(signal.item_id.as_str()))
            .all(|signal| !signal.sync_in_progress))
    }

    /// Start the background cleanup loop with the configured period and retention.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        self.manager.spawn_cleanup_loop(
            self.settings.cleanup_interval(),
            self.settings.retain_finished(),
        )
    }
}
