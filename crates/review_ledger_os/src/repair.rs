#![forbid(unsafe_code)]

use std::sync::Arc;

use review_ledger_contracts::review::{CorrelationId, Review, ReviewId};
use review_ledger_contracts::ReviewLedgerError;
use review_ledger_engines::ledger_client::LedgerClient;
use review_ledger_storage::repo::ReviewRepo;
use review_ledger_storage::review_store::ReviewRowFilter;
use tracing::{error, info, warn};

pub const REPAIR_CODE_COMPLETED: i32 = 0;
pub const REPAIR_CODE_FAILED: i32 = -1;

/// `min(running, total - 1)`; `None` when the ledger is empty.
pub fn positional_correlation_id(running: u64, total: u64) -> Option<CorrelationId> {
    total.checked_sub(1).map(|last| CorrelationId(running.min(last)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairedRow {
    pub review_id: ReviewId,
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairSkip {
    pub review_id: ReviewId,
    pub error: ReviewLedgerError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub code: i32,
    pub message: String,
    pub fixed_count: u32,
    pub repaired: Vec<RepairedRow>,
    pub skipped: Vec<RepairSkip>,
}

/// Back-fills correlation ids on half-synced rows by position.
///
/// The assigned id is a guess: nothing ties a row to its own ledger entry.
/// Repaired rows are tagged `CorrelationSource::RepairHeuristic`.
#[derive(Clone)]
pub struct IdRepairHeuristic {
    store: Arc<dyn ReviewRepo>,
    ledger: Arc<dyn LedgerClient>,
}

impl IdRepairHeuristic {
    pub fn new(store: Arc<dyn ReviewRepo>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { store, ledger }
    }

    pub fn repair_half_synced(&self) -> RepairReport {
        let rows = match self.store.query_review_rows(ReviewRowFilter::HalfSynced) {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "repair aborted: half-synced query failed");
                return RepairReport {
                    code: REPAIR_CODE_FAILED,
                    message: format!("repair failed: {err}"),
                    fixed_count: 0,
                    repaired: Vec::new(),
                    skipped: Vec::new(),
                };
            }
        };

        let mut repaired = Vec::new();
        let mut skipped = Vec::new();
        for review in rows {
            let review_id = review.id;
            match self.repair_row(review, repaired.len() as u64) {
                Ok(correlation_id) => {
                    warn!(
                        review_id = review_id.0,
                        correlation_id = correlation_id.0,
                        heuristic = true,
                        "correlation id assigned by position"
                    );
                    repaired.push(RepairedRow {
                        review_id,
                        correlation_id,
                    });
                }
                Err(err) => {
                    warn!(review_id = review_id.0, error = %err, "repair skipped row");
                    skipped.push(RepairSkip {
                        review_id,
                        error: err,
                    });
                }
            }
        }

        let fixed_count = repaired.len() as u32;
        info!(fixed_count, skipped = skipped.len(), "repair finished");
        RepairReport {
            code: REPAIR_CODE_COMPLETED,
            message: format!("repair finished: {fixed_count} reviews fixed"),
            fixed_count,
            repaired,
            skipped,
        }
    }

    fn repair_row(&self, mut review: Review, running: u64) -> Result<CorrelationId, ReviewLedgerError> {
        let total = self
            .ledger
            .total_count()
            .map_err(|e| ReviewLedgerError::LedgerQuery(e.to_string()))?;
        let correlation_id =
            positional_correlation_id(running, total).ok_or(ReviewLedgerError::LedgerEmpty)?;
        review.assign_heuristic_correlation(correlation_id)?;
        self.store.update_review_row(&review).map_err(|e| ReviewLedgerError::Persistence {
            reason: e.to_string(),
            tx_hash: review.tx_hash.clone(),
        })?;
        Ok(correlation_id)
    }
}
