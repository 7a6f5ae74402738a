//! Background sync worker.
//!
//! `connect_store` returns before the first sync runs. It pushes a
//! [`SyncJob`] onto a [`SyncQueue`]; the [`SyncWorker`] picks the job up,
//! waits the configured initial delay, and runs the sync with retries.
//!
//! The worker holds only a `Weak` handle to the service, so dropping the
//! service closes the queue and stops the worker.

use std::sync::Weak;
use std::time::Duration;

use socialspark_core::{ConnectionId, SyncOptions, SyncResult, SyncType};
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, info_span, warn};

use super::store_integration::{IntegrationError, StoreIntegrationService};
use crate::config::SyncWorkerConfig;

/// A queued sync for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub connection_id: ConnectionId,
    /// Empty means the connection's configured types.
    pub sync_types: Vec<SyncType>,
}

/// Sending half of the job queue.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tx: mpsc::UnboundedSender<SyncJob>,
}

/// Receiving half of the job queue, consumed by [`SyncWorker`].
#[derive(Debug)]
pub struct SyncJobs {
    rx: mpsc::UnboundedReceiver<SyncJob>,
}

impl SyncQueue {
    #[must_use]
    pub fn channel() -> (Self, SyncJobs) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SyncJobs { rx })
    }

    /// Returns `false` when the worker has shut down.
    #[must_use]
    pub fn enqueue(&self, job: SyncJob) -> bool {
        self.tx.send(job).is_ok()
    }
}

/// Retry schedule for background syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, doubling from `base_backoff`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1 << exponent)
    }

    const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 { 1 } else { self.max_attempts }
    }
}

impl From<SyncWorkerConfig> for RetryPolicy {
    fn from(config: SyncWorkerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: config.base_backoff,
        }
    }
}

/// What to do after one attempt.
#[derive(Debug, PartialEq, Eq)]
enum Attempt {
    Done,
    Retry(String),
    GiveUp(String),
}

fn classify(outcome: &Result<SyncResult, IntegrationError>) -> Attempt {
    match outcome {
        Ok(result) if result.items_synced == 0 && !result.errors.is_empty() => {
            Attempt::Retry(result.errors.join("; "))
        }
        Ok(_) => Attempt::Done,
        Err(e) if e.is_retryable() => Attempt::Retry(e.to_string()),
        Err(e) => Attempt::GiveUp(e.to_string()),
    }
}

/// Drains the sync queue.
pub struct SyncWorker {
    service: Weak<StoreIntegrationService>,
    jobs: SyncJobs,
    initial_delay: Duration,
    retry: RetryPolicy,
}

impl SyncWorker {
    #[must_use]
    pub fn new(
        service: Weak<StoreIntegrationService>,
        jobs: SyncJobs,
        config: SyncWorkerConfig,
    ) -> Self {
        Self {
            service,
            jobs,
            initial_delay: config.initial_delay,
            retry: config.into(),
        }
    }

    /// Run until every [`SyncQueue`] handle is dropped.
    ///
    /// Each job runs on its own task so a slow store does not hold up others.
    pub async fn run(mut self) {
        info!("Sync worker started");
        while let Some(job) = self.jobs.rx.recv().await {
            let span = info_span!("sync_job", connection_id = %job.connection_id);
            tokio::spawn(
                run_job(self.service.clone(), job, self.initial_delay, self.retry).instrument(span),
            );
        }
        info!("Sync worker stopped");
    }
}

async fn run_job(
    service: Weak<StoreIntegrationService>,
    job: SyncJob,
    initial_delay: Duration,
    retry: RetryPolicy,
) {
    tokio::time::sleep(initial_delay).await;

    let attempts = retry.attempts();
    for attempt in 1..=attempts {
        let Some(svc) = service.upgrade() else {
            return;
        };
        let outcome = svc
            .sync_store_data(job.connection_id, &job.sync_types, SyncOptions::default())
            .await;
        drop(svc);

        match classify(&outcome) {
            Attempt::Done => {
                info!(attempt, "Background sync complete");
                return;
            }
            Attempt::GiveUp(reason) => {
                warn!(attempt, %reason, "Background sync skipped");
                return;
            }
            Attempt::Retry(reason) if attempt < attempts => {
                let wait = retry.backoff(attempt);
                warn!(
                    attempt,
                    %reason,
                    retry_in_secs = wait.as_secs(),
                    "Background sync failed; retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Attempt::Retry(reason) => {
                error!(attempt, %reason, "Background sync failed; giving up");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use socialspark_core::SyncHistoryId;

    use super::*;
    use crate::platforms::AdapterError;

    fn result(items_synced: u32, errors: &[&str]) -> SyncResult {
        SyncResult {
            success: errors.is_empty(),
            items_synced,
            items_failed: 0,
            errors: errors.iter().map(ToString::to_string).collect(),
            sync_history_id: SyncHistoryId::generate(),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(30));
        assert_eq!(policy.backoff(2), Duration::from_secs(60));
        assert_eq!(policy.backoff(3), Duration::from_secs(120));
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_backoff: Duration::ZERO,
        };
        assert_eq!(policy.attempts(), 1);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&Ok(result(5, &[]))), Attempt::Done);
        assert_eq!(classify(&Ok(result(3, &["one bad row"]))), Attempt::Done);
        assert_eq!(
            classify(&Ok(result(0, &["Failed to fetch products: timeout"]))),
            Attempt::Retry("Failed to fetch products: timeout".to_string())
        );
        assert_eq!(
            classify(&Err(IntegrationError::SyncInProgress)),
            Attempt::GiveUp("Sync already in progress".to_string())
        );
        assert!(matches!(
            classify(&Err(IntegrationError::Adapter(AdapterError::RateLimited(2)))),
            Attempt::Retry(_)
        ));
    }

    #[tokio::test]
    async fn test_enqueue_fails_after_worker_dropped() {
        let (queue, jobs) = SyncQueue::channel();
        drop(jobs);
        assert!(!queue.enqueue(SyncJob {
            connection_id: ConnectionId::generate(),
            sync_types: vec![SyncType::Products],
        }));
    }
}
