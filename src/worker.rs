//! Delivery worker: drains `pending`, delivers with bounded retry and files
//! each record as `sent` or `failed`.
//!
//! Runs as a long-lived tokio task. On start every record left in
//! `processing` by a crashed run is requeued. Shutdown is signalled through
//! a `watch` channel and observed between records and during idle sleeps.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::delivery::{send_with_retry, DeliveryClient, RetryPolicy};
use crate::queue::{DeliveryPayload, QueueError, QueueState, QueueStore, RecordHandle};

/// Pacing for [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Sleep between polls when nothing was delivered.
    pub poll_interval: Duration,
    /// Per-record retry bound.
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    /// Settings from the `[queue]` config section.
    pub fn from_config(queue: &QueueConfig) -> Self {
        Self {
            poll_interval: queue.poll_interval(),
            retry: queue.retry_policy(),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Outcome counts of one [`Worker::drain_once`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Delivered and moved to `sent`.
    pub sent: usize,
    /// Retries exhausted, moved to `failed`.
    pub failed: usize,
    /// Unreadable payload, moved to `failed` without a delivery attempt.
    pub rejected: usize,
    /// Lost the claim to another worker, or hit a storage error.
    pub skipped: usize,
    /// `pending` was empty (or could not be listed).
    pub was_idle: bool,
}

impl DrainReport {
    /// Records filed into a terminal state.
    pub fn handled(&self) -> usize {
        self.sent
            .saturating_add(self.failed)
            .saturating_add(self.rejected)
    }
}

enum Outcome {
    Sent,
    Failed,
    Rejected,
    Skipped,
}

/// Queue drainer.
pub struct Worker {
    store: Arc<dyn QueueStore>,
    client: Arc<dyn DeliveryClient>,
    settings: WorkerSettings,
}

impl Worker {
    /// Create a worker over `store` delivering through `client`.
    pub fn new(
        store: Arc<dyn QueueStore>,
        client: Arc<dyn DeliveryClient>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            client,
            settings,
        }
    }

    /// Requeue everything in `processing`. Returns the number requeued.
    ///
    /// # Errors
    ///
    /// Propagates storage errors from the store.
    pub fn recover(&self) -> Result<usize, QueueError> {
        self.store.recover()
    }

    /// Run until the shutdown signal flips to `true` or its sender drops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.settings.poll_interval,
            max_attempts = self.settings.retry.max_attempts(),
            "queue worker started"
        );

        match self.recover() {
            Ok(0) => {}
            Ok(requeued) => info!(requeued, "requeued records left in processing"),
            Err(e) => error!(error = %e, "crash recovery failed"),
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.drain_once(&shutdown).await;
            if report.handled() > 0 {
                continue;
            }

            tokio::select! {
                () = tokio::time::sleep(self.settings.poll_interval) => {}
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("queue worker stopped");
    }

    /// Process a snapshot of `pending`, oldest first.
    ///
    /// Stops before claiming the next record once `shutdown` reads `true`;
    /// unclaimed records stay in `pending`.
    pub async fn drain_once(&self, shutdown: &watch::Receiver<bool>) -> DrainReport {
        let mut report = DrainReport::default();

        let pending = match self.store.list(QueueState::Pending) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "failed to list pending records");
                report.was_idle = true;
                return report;
            }
        };
        if pending.is_empty() {
            report.was_idle = true;
            return report;
        }

        for handle in &pending {
            if *shutdown.borrow() {
                debug!("shutdown requested, leaving remaining records pending");
                break;
            }
            let counter = match self.process(handle).await {
                Outcome::Sent => &mut report.sent,
                Outcome::Failed => &mut report.failed,
                Outcome::Rejected => &mut report.rejected,
                Outcome::Skipped => &mut report.skipped,
            };
            *counter = counter.saturating_add(1);
        }

        debug!(?report, "drain pass finished");
        report
    }

    async fn process(&self, handle: &RecordHandle) -> Outcome {
        let id = handle.id();

        let claimed = match self.store.move_record(handle, QueueState::Processing) {
            Ok(claimed) => claimed,
            Err(e) if e.is_not_found() => {
                debug!(id, "record claimed elsewhere, skipping");
                return Outcome::Skipped;
            }
            Err(e) => {
                warn!(id, error = %e, "failed to claim record");
                return Outcome::Skipped;
            }
        };

        let bytes = match self.store.read(&claimed) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id, error = %e, "failed to read claimed record");
                return Outcome::Skipped;
            }
        };

        let payload = match DeliveryPayload::from_slice(&bytes) {
            Ok(payload) => payload,
            Err(e) => {
                error!(id, error = %e, "invalid queue payload");
                self.file(&claimed, QueueState::Failed);
                return Outcome::Rejected;
            }
        };

        match send_with_retry(
            self.client.as_ref(),
            &payload.number,
            &payload.text,
            &self.settings.retry,
        )
        .await
        {
            Ok(attempts) => {
                info!(id, number = %payload.number, attempts, "delivered SMS");
                self.file(&claimed, QueueState::Sent);
                Outcome::Sent
            }
            Err(e) => {
                error!(id, number = %payload.number, error = %e, "delivery failed");
                self.file(&claimed, QueueState::Failed);
                Outcome::Failed
            }
        }
    }

    /// Move a claimed record to its terminal state. A failure leaves it in
    /// `processing` for the next recovery.
    fn file(&self, claimed: &RecordHandle, to: QueueState) {
        if let Err(e) = self.store.move_record(claimed, to) {
            error!(id = claimed.id(), to = %to, error = %e, "failed to file record");
        }
    }
}
