use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{ProbeError, RefreshError, Result};
use crate::probe::classify_item_signal;
use crate::status::RefreshStatus;

use super::{RefreshJob, duration_millis};

enum WaitInterrupt {
    Cancelled,
    ParentCancelled,
    Deadline,
    Polled(std::result::Result<(), ProbeError>),
}

impl RefreshJob {
    /// Poll until every item completes, the job fails, is cancelled, or `timeout` elapses.
    ///
    /// Returns `Ok(())` only for `Completed`. A job already in a terminal
    /// state returns that state's result without probing.
    pub async fn wait(&self, timeout: Duration) -> Result<()> {
        self.wait_inner(None, timeout).await
    }

    /// Like `wait`, but also stops when `parent` is cancelled.
    ///
    /// Parent cancellation counts as the caller giving up and ends in `Cancelled`.
    pub async fn wait_with_cancel(
        &self,
        parent: &CancellationToken,
        timeout: Duration,
    ) -> Result<()> {
        self.wait_inner(Some(parent), timeout).await
    }

    async fn wait_inner(&self, parent: Option<&CancellationToken>, timeout: Duration) -> Result<()> {
        let current = self.status();
        if current.is_terminal() {
            return self.terminal_result(current);
        }
        if self
            .status
            .transition(RefreshStatus::Pending, RefreshStatus::InProgress)
        {
            tracing::info!(
                job_id = %self.id,
                items = self.item_ids.len(),
                timeout_ms = duration_millis(timeout),
                "refresh job started"
            );
        }

        let parent_cancelled = async {
            match parent {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let interrupt = tokio::select! {
            biased;
            () = self.cancel_token.cancelled() => WaitInterrupt::Cancelled,
            () = parent_cancelled => WaitInterrupt::ParentCancelled,
            () = tokio::time::sleep(timeout) => WaitInterrupt::Deadline,
            result = self.poll_until_terminal() => WaitInterrupt::Polled(result),
        };

        match interrupt {
            WaitInterrupt::Cancelled => self.settle(RefreshStatus::Cancelled),
            WaitInterrupt::ParentCancelled => {
                self.cancel();
                self.terminal_result(self.status())
            }
            WaitInterrupt::Deadline => {
                if self.is_cancelled() {
                    self.settle(RefreshStatus::Cancelled)
                } else {
                    tracing::warn!(
                        job_id = %self.id,
                        timeout_ms = duration_millis(timeout),
                        check_count = self.check_count(),
                        "refresh job timed out"
                    );
                    // First expired deadline is the one reported.
                    let _ = self.wait_timeout_ms.compare_exchange(
                        0,
                        duration_millis(timeout),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    self.settle(RefreshStatus::TimedOut)
                }
            }
            WaitInterrupt::Polled(Ok(())) => self.settle(RefreshStatus::Completed),
            WaitInterrupt::Polled(Err(error)) => match self.finish(RefreshStatus::Failed) {
                Ok(()) => Err(RefreshError::Probe(error)),
                Err(existing) => self.terminal_result(existing),
            },
        }
    }

    /// Finish with `to`; if another path already finished, report that outcome.
    fn settle(&self, to: RefreshStatus) -> Result<()> {
        match self.finish(to) {
            Ok(()) => self.terminal_result(to),
            Err(existing) => self.terminal_result(existing),
        }
    }

    async fn poll_until_terminal(&self) -> std::result::Result<(), ProbeError> {
        let mut interval = self.policy.interval_after(self.check_count());
        let mut ticker = poll_ticker(interval);

        loop {
            ticker.tick().await;
            // A concurrent waiter already settled the job.
            if self.status().is_terminal() {
                return Ok(());
            }

            match self.check_status().await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(error) => {
                    self.record_error(error.clone());
                    if !error.is_retryable() {
                        tracing::error!(
                            job_id = %self.id,
                            check_count = self.check_count(),
                            error = %error,
                            "refresh status probe failed"
                        );
                        return Err(error);
                    }
                    tracing::warn!(
                        job_id = %self.id,
                        check_count = self.check_count(),
                        error = %error,
                        "retryable refresh status probe error; continuing"
                    );
                }
            }

            let next = self.policy.interval_after(self.check_count());
            if next != interval {
                tracing::debug!(
                    job_id = %self.id,
                    check_count = self.check_count(),
                    interval_ms = duration_millis(next),
                    "refresh poll interval grew"
                );
                interval = next;
                ticker = poll_ticker(interval);
            }
        }
    }

    /// One probe round-trip; updates progress and reports whether all items are complete.
    async fn check_status(&self) -> std::result::Result<bool, ProbeError> {
        self.check_count.fetch_add(1, Ordering::AcqRel);
        self.last_check_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);

        let signals = self.probe.check(&self.item_ids).await?;

        let (all_complete, completed) = {
            let mut progress = self.lock_progress();
            for signal in &signals {
                if let Some(done) = progress.get_mut(&signal.item_id) {
                    *done = classify_item_signal(signal, self.started_at);
                }
            }
            let completed = progress.values().filter(|done| **done).count();
            (completed == progress.len(), completed)
        };

        tracing::debug!(
            job_id = %self.id,
            check_count = self.check_count(),
            completed,
            items = self.item_ids.len(),
            "refresh status checked"
        );
        Ok(all_complete)
    }

    /// Non-blocking completion check.
    ///
    /// `Pending` answers `false` without probing; `InProgress` probes once;
    /// terminal states map directly (`Completed` is `true`, the others return
    /// their error).
    pub async fn is_complete(&self) -> Result<bool> {
        match self.status() {
            RefreshStatus::Pending => Ok(false),
            RefreshStatus::InProgress => match self.check_status().await {
                Ok(complete) => Ok(complete),
                Err(error) => {
                    self.record_error(error.clone());
                    Err(RefreshError::Probe(error))
                }
            },
            RefreshStatus::Completed => Ok(true),
            terminal => self.terminal_result(terminal).map(|()| false),
        }
    }

    /// Cancel the job. Idempotent; a no-op once the job is terminal.
    pub fn cancel(&self) {
        if self.status().is_terminal() {
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        self.cancel_token.cancel();
        if let Err(existing) = self.finish(RefreshStatus::Cancelled) {
            tracing::debug!(
                job_id = %self.id,
                status = %existing,
                "cancel raced with another terminal transition"
            );
        }
    }
}

fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
