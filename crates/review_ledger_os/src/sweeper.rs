#![forbid(unsafe_code)]

use std::sync::Arc;

use review_ledger_contracts::review::ReviewId;
use review_ledger_engines::reconcile::{ReconcileResult, ReconciliationEngine};
use review_ledger_storage::repo::ReviewRepo;
use review_ledger_storage::review_store::ReviewRowFilter;
use tracing::{debug, error, info, warn};

pub const SWEEP_CODE_COMPLETED: i32 = 0;
pub const SWEEP_CODE_NOTHING_TO_SWEEP: i32 = 1;
pub const SWEEP_CODE_FAILED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepItemStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepItemOutcome {
    pub review_id: ReviewId,
    pub status: SweepItemStatus,
    pub result: ReconcileResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub code: i32,
    pub message: String,
    pub success_count: u32,
    pub fail_count: u32,
    pub details: Vec<SweepItemOutcome>,
}

impl SweepReport {
    fn empty(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            success_count: 0,
            fail_count: 0,
            details: Vec::new(),
        }
    }

    pub fn attempted(&self) -> usize {
        self.details.len()
    }
}

/// Sequential pass over every review that has no tx hash yet.
#[derive(Clone)]
pub struct BatchSweeper {
    store: Arc<dyn ReviewRepo>,
    engine: ReconciliationEngine,
}

impl BatchSweeper {
    pub fn new(store: Arc<dyn ReviewRepo>, engine: ReconciliationEngine) -> Self {
        Self { store, engine }
    }

    pub fn sweep_unsynced(&self) -> SweepReport {
        let pending = match self.store.query_review_rows(ReviewRowFilter::TxHashMissing) {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "sweep aborted: unsynced query failed");
                return SweepReport::empty(SWEEP_CODE_FAILED, format!("sweep failed: {err}"));
            }
        };
        if pending.is_empty() {
            debug!("sweep found no unsynced reviews");
            return SweepReport::empty(
                SWEEP_CODE_NOTHING_TO_SWEEP,
                "no unsynced reviews".to_string(),
            );
        }

        let mut report = SweepReport::empty(SWEEP_CODE_COMPLETED, String::new());
        for review in pending {
            let result = self.engine.submit(review.id);
            let status = if result.is_success() {
                report.success_count += 1;
                SweepItemStatus::Success
            } else {
                report.fail_count += 1;
                warn!(
                    review_id = review.id.0,
                    reason_code = result.reason_code.0,
                    "sweep item failed"
                );
                SweepItemStatus::Failed
            };
            report.details.push(SweepItemOutcome {
                review_id: review.id,
                status,
                result,
            });
        }
        report.message = format!(
            "sweep finished: {} succeeded, {} failed",
            report.success_count, report.fail_count
        );
        info!(
            success_count = report.success_count,
            fail_count = report.fail_count,
            "sweep finished"
        );
        report
    }
}
