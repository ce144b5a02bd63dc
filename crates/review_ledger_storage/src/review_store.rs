#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use review_ledger_contracts::review::{Review, ReviewId, ReviewRowInput, ReviewSyncState};
use review_ledger_contracts::{ContractViolation, ReviewLedgerError, Validate};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("{table} row not found: {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table} duplicate key: {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

impl From<StorageError> for ReviewLedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { table, key } => ReviewLedgerError::NotFound {
                entity: table,
                key,
            },
            StorageError::ContractViolation(v) => ReviewLedgerError::ContractViolation(v),
            other => ReviewLedgerError::persistence(other.to_string()),
        }
    }
}

/// Row selections the reconciliation passes need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewRowFilter {
    All,
    /// `tx_hash` null or empty.
    TxHashMissing,
    /// `tx_hash` set, `correlation_id` null.
    HalfSynced,
    /// `tx_hash` set, regardless of correlation id.
    TxHashPresent,
}

impl ReviewRowFilter {
    pub fn matches(self, review: &Review) -> bool {
        match self {
            ReviewRowFilter::All => true,
            ReviewRowFilter::TxHashMissing => review.tx_hash.is_none(),
            ReviewRowFilter::HalfSynced => review.sync_state() == ReviewSyncState::HalfSynced,
            ReviewRowFilter::TxHashPresent => review.tx_hash.is_some(),
        }
    }
}

#[derive(Debug)]
struct ReviewTables {
    reviews: BTreeMap<ReviewId, Review>,
    next_review_id: u64,
}

/// In-process review table. Rows are kept in id order so every query is
/// returned in insertion order.
#[derive(Debug)]
pub struct ReviewLedgerStore {
    tables: Mutex<ReviewTables>,
}

impl Default for ReviewLedgerStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

impl ReviewLedgerStore {
    pub fn new_in_memory() -> Self {
        Self {
            tables: Mutex::new(ReviewTables {
                reviews: BTreeMap::new(),
                next_review_id: 1,
            }),
        }
    }

    fn tables(&self) -> MutexGuard<'_, ReviewTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_review(&self, input: ReviewRowInput) -> Result<Review, StorageError> {
        let mut tables = self.tables();
        let id = ReviewId(tables.next_review_id);
        if tables.reviews.contains_key(&id) {
            return Err(StorageError::DuplicateKey {
                table: "reviews",
                key: id.to_string(),
            });
        }
        let review = Review::unsynced_v1(id, input)?;
        tables.reviews.insert(id, review.clone());
        tables.next_review_id = tables.next_review_id.saturating_add(1);
        debug!(review_id = id.0, "review row inserted");
        Ok(review)
    }

    pub fn review_row(&self, review_id: ReviewId) -> Option<Review> {
        self.tables().reviews.get(&review_id).cloned()
    }

    /// Whole-row replacement keyed by id.
    pub fn update_review(&self, review: &Review) -> Result<(), StorageError> {
        review.validate()?;
        let mut tables = self.tables();
        match tables.reviews.get_mut(&review.id) {
            Some(row) => {
                *row = review.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                table: "reviews",
                key: review.id.to_string(),
            }),
        }
    }

    pub fn review_rows_where(&self, filter: ReviewRowFilter) -> Vec<Review> {
        self.tables()
            .reviews
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    pub fn review_row_count(&self) -> usize {
        self.tables().reviews.len()
    }
}
