#![forbid(unsafe_code)]

use review_ledger_contracts::review::{Address, ReviewId};
use review_ledger_contracts::{MonotonicTimeNs, ReviewLedgerError};
use review_ledger_storage::repo::ReviewRepo;
use review_ledger_storage::ttl_cache::TtlCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const VOTE_TTL_SECONDS_DEFAULT: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub review_id: ReviewId,
    pub helpful_votes: u32,
    pub unhelpful_votes: u32,
}

pub fn vote_key(review_id: ReviewId, address: &Address) -> String {
    format!("vote:{}:{}", review_id.0, address.as_str())
}

/// One helpfulness vote per (review, address) within the TTL window.
///
/// The existence check and the marker write are separate cache calls, so two
/// concurrent votes for the same key can both be counted.
#[derive(Debug)]
pub struct VoteDedupGuard {
    ttl_seconds: u64,
    cast: TtlCache<String, ()>,
}

impl VoteDedupGuard {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl_seconds,
            cast: TtlCache::new(),
        }
    }

    pub fn has_voted(&self, now: MonotonicTimeNs, review_id: ReviewId, address: &Address) -> bool {
        self.cast.exists(now, &vote_key(review_id, address))
    }

    pub fn register_vote(
        &self,
        now: MonotonicTimeNs,
        store: &dyn ReviewRepo,
        review_id: ReviewId,
        address: &Address,
        is_helpful: bool,
    ) -> Result<VoteTally, ReviewLedgerError> {
        let mut review = store
            .get_review_row(review_id)?
            .ok_or_else(|| ReviewLedgerError::review_not_found(review_id))?;

        let key = vote_key(review_id, address);
        if self.cast.exists(now, &key) {
            return Err(ReviewLedgerError::DuplicateVote {
                review_id,
                address: address.clone(),
            });
        }

        review.record_vote(is_helpful);
        store
            .update_review_row(&review)
            .map_err(|e| ReviewLedgerError::persistence(e.to_string()))?;

        self.cast.set(now, key, (), self.ttl_seconds);
        debug!(review_id = review_id.0, address = %address, is_helpful, "vote recorded");
        Ok(VoteTally {
            review_id,
            helpful_votes: review.helpful_votes,
            unhelpful_votes: review.unhelpful_votes,
        })
    }
}
