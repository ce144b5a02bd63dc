#![forbid(unsafe_code)]

use review_ledger_contracts::review::{NftId, ReviewDraft, ReviewId, ReviewRowInput};
use review_ledger_contracts::{MonotonicTimeNs, ReviewLedgerError};
use review_ledger_storage::repo::ReviewRepo;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewCreated {
    pub review_id: ReviewId,
    pub nft_id: NftId,
    /// False until a background upload has been queued for the review.
    pub upload_enqueued: bool,
}

/// Writes the review locally as unsynced. Ledger upload is the caller's
/// follow-up and never affects this result.
pub fn create_review(
    store: &dyn ReviewRepo,
    now: MonotonicTimeNs,
    draft: ReviewDraft,
    verified_reputation_min: u32,
) -> Result<ReviewCreated, ReviewLedgerError> {
    let input = ReviewRowInput::from_draft(draft, now, verified_reputation_min)?;
    let review = store
        .insert_review_row(input)
        .map_err(|e| ReviewLedgerError::persistence(e.to_string()))?;
    info!(
        review_id = review.id.0,
        product_id = review.product_id.0,
        verified = review.verified,
        "review created"
    );
    Ok(ReviewCreated {
        review_id: review.id,
        nft_id: review.nft_id,
        upload_enqueued: false,
    })
}
