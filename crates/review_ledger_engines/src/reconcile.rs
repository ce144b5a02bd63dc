#![forbid(unsafe_code)]

use std::sync::Arc;

use review_ledger_contracts::ledger::LedgerSubmission;
use review_ledger_contracts::review::{CorrelationId, ReviewId, TxHash};
use review_ledger_contracts::{ReasonCodeId, ReviewLedgerError};
use review_ledger_storage::repo::ReviewRepo;
use tracing::{error, info, warn};

use crate::ledger_client::LedgerClient;

pub mod reason_codes {
    use review_ledger_contracts::ReasonCodeId;

    pub const RECONCILE_OK_SYNCED: ReasonCodeId = ReasonCodeId(0x5245_0001);
    pub const RECONCILE_OK_ALREADY_SYNCED: ReasonCodeId = ReasonCodeId(0x5245_0002);

    pub const RECONCILE_REVIEW_NOT_FOUND: ReasonCodeId = ReasonCodeId(0x5245_00F1);
    pub const RECONCILE_LEDGER_SUBMIT_FAILED: ReasonCodeId = ReasonCodeId(0x5245_00F2);
    pub const RECONCILE_LEDGER_QUERY_FAILED: ReasonCodeId = ReasonCodeId(0x5245_00F3);
    pub const RECONCILE_PERSIST_FAILED: ReasonCodeId = ReasonCodeId(0x5245_00F4);
    pub const RECONCILE_INTERNAL_ERROR: ReasonCodeId = ReasonCodeId(0x5245_00F5);
}

pub const RECONCILE_CODE_SYNCED: i32 = 0;
pub const RECONCILE_CODE_ALREADY_SYNCED: i32 = 1;
pub const RECONCILE_CODE_FAILED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    Synced,
    AlreadySynced,
    Failed(ReviewLedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub review_id: ReviewId,
    pub status: ReconcileStatus,
    pub tx_hash: Option<TxHash>,
    pub correlation_id: Option<CorrelationId>,
    pub reason_code: ReasonCodeId,
    pub message: String,
}

impl ReconcileResult {
    pub fn code(&self) -> i32 {
        match self.status {
            ReconcileStatus::Synced => RECONCILE_CODE_SYNCED,
            ReconcileStatus::AlreadySynced => RECONCILE_CODE_ALREADY_SYNCED,
            ReconcileStatus::Failed(_) => RECONCILE_CODE_FAILED,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, ReconcileStatus::Failed(_))
    }

    fn failed(review_id: ReviewId, err: ReviewLedgerError) -> Self {
        let reason_code = match &err {
            ReviewLedgerError::NotFound { .. } => reason_codes::RECONCILE_REVIEW_NOT_FOUND,
            ReviewLedgerError::LedgerSubmission(_) => {
                reason_codes::RECONCILE_LEDGER_SUBMIT_FAILED
            }
            ReviewLedgerError::LedgerQuery(_) | ReviewLedgerError::LedgerEmpty => {
                reason_codes::RECONCILE_LEDGER_QUERY_FAILED
            }
            ReviewLedgerError::Persistence { .. } => reason_codes::RECONCILE_PERSIST_FAILED,
            _ => reason_codes::RECONCILE_INTERNAL_ERROR,
        };
        let tx_hash = match &err {
            ReviewLedgerError::Persistence { tx_hash, .. } => tx_hash.clone(),
            _ => None,
        };
        Self {
            review_id,
            message: format!("ledger upload failed: {}", err),
            status: ReconcileStatus::Failed(err),
            tx_hash,
            correlation_id: None,
            reason_code,
        }
    }
}

/// Pushes one review onto the ledger and records where it landed.
///
/// The ledger call and the local write are two separate steps with no lock
/// spanning them; a failure between them leaves the row half-synced.
#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn ReviewRepo>,
    ledger: Arc<dyn LedgerClient>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn ReviewRepo>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { store, ledger }
    }

    /// Never returns an error; every failure is folded into the result.
    pub fn submit(&self, review_id: ReviewId) -> ReconcileResult {
        match self.try_submit(review_id) {
            Ok(result) => result,
            Err(err) => {
                warn!(review_id = review_id.0, error = %err, "ledger upload failed");
                ReconcileResult::failed(review_id, err)
            }
        }
    }

    fn try_submit(&self, review_id: ReviewId) -> Result<ReconcileResult, ReviewLedgerError> {
        let mut review = self
            .store
            .get_review_row(review_id)?
            .ok_or_else(|| ReviewLedgerError::review_not_found(review_id))?;

        if review.is_synced() {
            let tx_hash = review.tx_hash.clone();
            return Ok(ReconcileResult {
                review_id,
                status: ReconcileStatus::AlreadySynced,
                message: format!(
                    "review already on ledger, tx {}",
                    tx_hash.as_ref().map(TxHash::as_str).unwrap_or_default()
                ),
                tx_hash,
                correlation_id: review.correlation_id,
                reason_code: reason_codes::RECONCILE_OK_ALREADY_SYNCED,
            });
        }

        let submission = LedgerSubmission::from_review(&review);
        let tx_hash = self
            .ledger
            .submit(&submission)
            .map_err(|e| ReviewLedgerError::LedgerSubmission(e.to_string()))?;

        // Assumes no other writer appended between submit and count.
        let total = self.ledger.total_count().map_err(|e| {
            ReviewLedgerError::LedgerQuery(format!("total count after submit {tx_hash}: {e}"))
        })?;
        let correlation_id = CorrelationId(total);

        review.mark_synced(tx_hash.clone(), correlation_id);
        if let Err(err) = self.store.update_review_row(&review) {
            error!(
                review_id = review_id.0,
                tx_hash = %tx_hash,
                correlation_id = correlation_id.0,
                error = %err,
                "review is on the ledger but the local write failed; row left half-synced"
            );
            return Err(ReviewLedgerError::Persistence {
                reason: err.to_string(),
                tx_hash: Some(tx_hash),
            });
        }

        info!(
            review_id = review_id.0,
            tx_hash = %tx_hash,
            correlation_id = correlation_id.0,
            "review uploaded to ledger"
        );
        Ok(ReconcileResult {
            review_id,
            status: ReconcileStatus::Synced,
            message: "review uploaded to ledger".to_string(),
            tx_hash: Some(tx_hash),
            correlation_id: Some(correlation_id),
            reason_code: reason_codes::RECONCILE_OK_SYNCED,
        })
    }
}
