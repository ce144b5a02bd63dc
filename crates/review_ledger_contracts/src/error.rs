#![forbid(unsafe_code)]

use crate::review::{Address, ReviewId, TxHash};
use crate::ContractViolation;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReviewLedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("ledger submission failed: {0}")]
    LedgerSubmission(String),
    #[error("ledger query failed: {0}")]
    LedgerQuery(String),
    #[error("ledger reports no entries")]
    LedgerEmpty,
    #[error("local persistence failed{}: {reason}", tx_suffix(.tx_hash))]
    Persistence {
        reason: String,
        tx_hash: Option<TxHash>,
    },
    #[error("review {review_id} already has a vote from {address}")]
    DuplicateVote { review_id: ReviewId, address: Address },
    #[error("nonce invalid for {0}")]
    NonceInvalid(Address),
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

impl ReviewLedgerError {
    pub fn review_not_found(review_id: ReviewId) -> Self {
        Self::NotFound {
            entity: "review",
            key: review_id.to_string(),
        }
    }

    pub fn persistence(reason: impl Into<String>) -> Self {
        Self::Persistence {
            reason: reason.into(),
            tx_hash: None,
        }
    }
}

fn tx_suffix(tx_hash: &Option<TxHash>) -> String {
    match tx_hash {
        Some(tx) => format!(" after ledger submission {tx}"),
        None => String::new(),
    }
}
