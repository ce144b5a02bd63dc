#![forbid(unsafe_code)]

use review_ledger_contracts::review::{Review, ReviewId, ReviewRowInput};

use crate::review_store::{ReviewLedgerStore, ReviewRowFilter, StorageError};

/// Typed repository interface for the review table.
///
/// Every call is a single-row (or single-query) operation; nothing here spans
/// more than one call, so callers never hold a store lock across ledger I/O.
pub trait ReviewRepo: Send + Sync {
    fn insert_review_row(&self, input: ReviewRowInput) -> Result<Review, StorageError>;
    fn get_review_row(&self, review_id: ReviewId) -> Result<Option<Review>, StorageError>;
    fn update_review_row(&self, review: &Review) -> Result<(), StorageError>;
    fn query_review_rows(&self, filter: ReviewRowFilter) -> Result<Vec<Review>, StorageError>;
}

impl ReviewRepo for ReviewLedgerStore {
    fn insert_review_row(&self, input: ReviewRowInput) -> Result<Review, StorageError> {
        self.insert_review(input)
    }

    fn get_review_row(&self, review_id: ReviewId) -> Result<Option<Review>, StorageError> {
        Ok(self.review_row(review_id))
    }

    fn update_review_row(&self, review: &Review) -> Result<(), StorageError> {
        self.update_review(review)
    }

    fn query_review_rows(&self, filter: ReviewRowFilter) -> Result<Vec<Review>, StorageError> {
        Ok(self.review_rows_where(filter))
    }
}
