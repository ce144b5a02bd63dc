#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::review::{CorrelationId, Review, TxHash};

/// Payload written to the ledger. Only content fields travel; the signing
/// identity is whatever the ledger client is configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSubmission {
    pub product_id: String,
    pub content: String,
    pub rating: u8,
}

impl LedgerSubmission {
    pub fn from_review(review: &Review) -> Self {
        Self {
            product_id: review.product_id.0.to_string(),
            content: review.content.clone(),
            rating: review.rating,
        }
    }
}

/// A review as the ledger reports it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub correlation_id: CorrelationId,
    pub tx_hash: TxHash,
    pub product_id: String,
    pub content: String,
    pub rating: u8,
    pub submitter: Option<String>,
}
