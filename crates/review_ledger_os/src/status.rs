#![forbid(unsafe_code)]

use review_ledger_contracts::ledger::LedgerRecord;
use review_ledger_contracts::review::{CorrelationId, Review, ReviewId, TxHash};
use review_ledger_contracts::ReviewLedgerError;
use review_ledger_engines::ledger_client::LedgerClient;
use review_ledger_storage::repo::ReviewRepo;
use review_ledger_storage::review_store::ReviewRowFilter;
use serde::Serialize;

pub const LIST_PAGE_SIZE_MAX: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LedgerStatusView {
    NotSubmitted,
    AwaitingCorrelationId {
        tx_hash: TxHash,
    },
    Confirmed {
        tx_hash: TxHash,
        correlation_id: CorrelationId,
        record: LedgerRecord,
    },
    MissingOnLedger {
        tx_hash: TxHash,
        correlation_id: CorrelationId,
    },
}

pub fn ledger_status(
    store: &dyn ReviewRepo,
    ledger: &dyn LedgerClient,
    review_id: ReviewId,
) -> Result<LedgerStatusView, ReviewLedgerError> {
    let review = store
        .get_review_row(review_id)?
        .ok_or_else(|| ReviewLedgerError::review_not_found(review_id))?;
    let (tx_hash, correlation_id) = match (review.tx_hash, review.correlation_id) {
        (None, _) => return Ok(LedgerStatusView::NotSubmitted),
        (Some(tx_hash), None) => return Ok(LedgerStatusView::AwaitingCorrelationId { tx_hash }),
        (Some(tx_hash), Some(correlation_id)) => (tx_hash, correlation_id),
    };
    let record = ledger
        .get_by_correlation_id(correlation_id)
        .map_err(|e| ReviewLedgerError::LedgerQuery(e.to_string()))?;
    Ok(match record {
        Some(record) => LedgerStatusView::Confirmed {
            tx_hash,
            correlation_id,
            record,
        },
        None => LedgerStatusView::MissingOnLedger {
            tx_hash,
            correlation_id,
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncedReviewPage {
    pub items: Vec<Review>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Reviews carrying a tx hash, newest first. `page` is 1-based; out of
/// range inputs are clamped.
pub fn list_synced(
    store: &dyn ReviewRepo,
    page: u32,
    page_size: u32,
) -> Result<SyncedReviewPage, ReviewLedgerError> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, LIST_PAGE_SIZE_MAX);
    let mut rows = store.query_review_rows(ReviewRowFilter::TxHashPresent)?;
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    let total = rows.len() as u64;
    let skip = (page as usize - 1).saturating_mul(page_size as usize);
    let items = rows.into_iter().skip(skip).take(page_size as usize).collect();
    Ok(SyncedReviewPage {
        items,
        total,
        page,
        page_size,
    })
}
