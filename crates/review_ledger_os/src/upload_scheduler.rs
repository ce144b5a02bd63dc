#![forbid(unsafe_code)]

use std::time::Duration;

use review_ledger_contracts::review::ReviewId;
use review_ledger_engines::reconcile::ReconciliationEngine;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::config::ReviewLedgerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Enqueued,
    QueueFull,
    Closed,
}

impl ScheduleOutcome {
    pub fn is_enqueued(self) -> bool {
        self == Self::Enqueued
    }
}

/// Fire-and-forget hand-off of freshly created reviews to the ledger.
///
/// Each job waits the configured delay before reading the row back, then runs
/// the blocking engine call on the blocking pool. Outcomes are only logged;
/// anything that does not make it is picked up by the next sweep.
#[derive(Debug, Clone)]
pub struct AsyncUploadScheduler {
    tx: mpsc::Sender<ReviewId>,
}

impl AsyncUploadScheduler {
    pub fn spawn(handle: &Handle, engine: ReconciliationEngine, config: &ReviewLedgerConfig) -> Self {
        let (tx, mut rx) = mpsc::channel::<ReviewId>(config.upload_queue_capacity.max(1));
        let delay = config.upload_delay();
        let jobs = handle.clone();
        handle.spawn(async move {
            while let Some(review_id) = rx.recv().await {
                jobs.spawn(run_upload_job(engine.clone(), review_id, delay));
            }
            debug!("upload scheduler queue closed");
        });
        Self { tx }
    }

    pub fn schedule(&self, review_id: ReviewId) -> ScheduleOutcome {
        match self.tx.try_send(review_id) {
            Ok(()) => {
                debug!(review_id = review_id.0, "ledger upload enqueued");
                ScheduleOutcome::Enqueued
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    review_id = review_id.0,
                    "upload queue full; review left for the next sweep"
                );
                ScheduleOutcome::QueueFull
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    review_id = review_id.0,
                    "upload queue closed; review left for the next sweep"
                );
                ScheduleOutcome::Closed
            }
        }
    }
}

async fn run_upload_job(engine: ReconciliationEngine, review_id: ReviewId, delay: Duration) {
    // Give the creating write time to become visible to this read path.
    tokio::time::sleep(delay).await;
    match tokio::task::spawn_blocking(move || engine.submit(review_id)).await {
        Ok(result) if result.is_success() => {
            info!(
                review_id = review_id.0,
                code = result.code(),
                "background ledger upload finished"
            );
        }
        Ok(result) => {
            warn!(
                review_id = review_id.0,
                reason_code = result.reason_code.0,
                message = %result.message,
                "background ledger upload failed; waiting for sweep"
            );
        }
        Err(join_err) => {
            error!(review_id = review_id.0, error = %join_err, "background ledger upload task aborted");
        }
    }
}
