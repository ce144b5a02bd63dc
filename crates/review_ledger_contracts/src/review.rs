#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::validate_token_text;
use crate::{ContractViolation, MonotonicTimeNs, Validate};

pub const REVIEW_RATING_MIN: u8 = 1;
pub const REVIEW_RATING_MAX: u8 = 5;
pub const REVIEW_CONTENT_MAX_BYTES: usize = 8_192;
pub const TX_HASH_MAX_LEN: usize = 130;
pub const ADDRESS_MAX_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub u64);

impl Validate for ReviewId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "review_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a review on the ledger.
///
/// Zero is a legal value: positional repair may assign it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Result<Self, ContractViolation> {
        let hash = hash.into();
        validate_token_text("tx_hash", &hash, TX_HASH_MAX_LEN)?;
        Ok(Self(hash))
    }

    /// Maps the "null or empty" column convention onto `Option`.
    pub fn from_column(column: Option<String>) -> Result<Option<Self>, ContractViolation> {
        match column {
            Some(s) if !s.trim().is_empty() => Self::new(s).map(Some),
            _ => Ok(None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TxHash> for String {
    fn from(value: TxHash) -> Self {
        value.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wallet address of a reviewer, voter or login subject.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Result<Self, ContractViolation> {
        let address = address.into();
        validate_token_text("address", &address, ADDRESS_MAX_LEN)?;
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ContractViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftId(String);

impl NftId {
    /// Final token id, derived only from the ledger correlation id.
    pub fn for_correlation(correlation_id: CorrelationId) -> Self {
        Self(format!("NFT_{}", correlation_id.0))
    }

    /// Placeholder assigned at intake, before the ledger knows the review.
    pub fn provisional(product_id: ProductId, created_at: MonotonicTimeNs) -> Self {
        Self(format!("NFT_{}_{}", product_id.0, created_at.as_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a stored correlation id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationSource {
    Engine,
    RepairHeuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewSyncState {
    Unsynced,
    HalfSynced,
    Synced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub author_address: Address,
    pub rating: u8,
    pub content: String,
    pub images: Option<String>,
    pub ipfs_cid: Option<String>,
    pub nft_id: NftId,
    pub helpful_votes: u32,
    pub unhelpful_votes: u32,
    pub verified: bool,
    pub tx_hash: Option<TxHash>,
    pub correlation_id: Option<CorrelationId>,
    pub correlation_source: Option<CorrelationSource>,
    pub created_at: MonotonicTimeNs,
}

impl Review {
    /// Materializes a freshly inserted row. Both sync fields start empty.
    pub fn unsynced_v1(id: ReviewId, input: ReviewRowInput) -> Result<Self, ContractViolation> {
        let review = Self {
            id,
            product_id: input.product_id,
            author_address: input.author_address,
            rating: input.rating,
            content: input.content,
            images: input.images,
            ipfs_cid: input.ipfs_cid,
            nft_id: input.nft_id,
            helpful_votes: 0,
            unhelpful_votes: 0,
            verified: input.verified,
            tx_hash: None,
            correlation_id: None,
            correlation_source: None,
            created_at: input.created_at,
        };
        review.validate()?;
        Ok(review)
    }

    pub fn sync_state(&self) -> ReviewSyncState {
        match (&self.tx_hash, self.correlation_id) {
            (Some(_), Some(_)) => ReviewSyncState::Synced,
            (Some(_), None) => ReviewSyncState::HalfSynced,
            (None, _) => ReviewSyncState::Unsynced,
        }
    }

    pub fn is_synced(&self) -> bool {
        self.sync_state() == ReviewSyncState::Synced
    }

    /// Sets both sync fields together and re-derives the token id.
    pub fn mark_synced(&mut self, tx_hash: TxHash, correlation_id: CorrelationId) {
        self.tx_hash = Some(tx_hash);
        self.correlation_id = Some(correlation_id);
        self.correlation_source = Some(CorrelationSource::Engine);
        self.nft_id = NftId::for_correlation(correlation_id);
    }

    /// Fills in a positional correlation id for a half-synced row. The token id is left as is.
    pub fn assign_heuristic_correlation(
        &mut self,
        correlation_id: CorrelationId,
    ) -> Result<(), ContractViolation> {
        if self.sync_state() != ReviewSyncState::HalfSynced {
            return Err(ContractViolation::InvalidValue {
                field: "review.correlation_id",
                reason: "heuristic assignment requires a half-synced review",
            });
        }
        self.correlation_id = Some(correlation_id);
        self.correlation_source = Some(CorrelationSource::RepairHeuristic);
        Ok(())
    }

    pub fn record_vote(&mut self, is_helpful: bool) {
        if is_helpful {
            self.helpful_votes = self.helpful_votes.saturating_add(1);
        } else {
            self.unhelpful_votes = self.unhelpful_votes.saturating_add(1);
        }
    }
}

impl Validate for Review {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        validate_rating(self.rating)?;
        validate_content(&self.content)?;
        if self.correlation_id.is_some() && self.tx_hash.is_none() {
            return Err(ContractViolation::InvalidValue {
                field: "review.correlation_id",
                reason: "requires tx_hash to be set",
            });
        }
        if self.correlation_source.is_some() != self.correlation_id.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "review.correlation_source",
                reason: "must be present exactly when correlation_id is present",
            });
        }
        Ok(())
    }
}

/// Caller-supplied content of a new review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub product_id: ProductId,
    pub author_address: Address,
    pub rating: u8,
    pub content: String,
    pub images: Option<String>,
    pub ipfs_cid: Option<String>,
    pub author_reputation: u32,
}

impl ReviewDraft {
    pub fn v1(
        product_id: ProductId,
        author_address: Address,
        rating: u8,
        content: String,
        author_reputation: u32,
    ) -> Result<Self, ContractViolation> {
        let draft = Self {
            product_id,
            author_address,
            rating,
            content,
            images: None,
            ipfs_cid: None,
            author_reputation,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn with_attachments(mut self, images: Option<String>, ipfs_cid: Option<String>) -> Self {
        self.images = images;
        self.ipfs_cid = ipfs_cid;
        self
    }
}

impl Validate for ReviewDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_rating(self.rating)?;
        validate_content(&self.content)
    }
}

/// Row shape handed to the store on insert; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRowInput {
    pub product_id: ProductId,
    pub author_address: Address,
    pub rating: u8,
    pub content: String,
    pub images: Option<String>,
    pub ipfs_cid: Option<String>,
    pub nft_id: NftId,
    pub verified: bool,
    pub created_at: MonotonicTimeNs,
}

impl ReviewRowInput {
    pub fn from_draft(
        draft: ReviewDraft,
        created_at: MonotonicTimeNs,
        verified_reputation_min: u32,
    ) -> Result<Self, ContractViolation> {
        draft.validate()?;
        Ok(Self {
            nft_id: NftId::provisional(draft.product_id, created_at),
            verified: draft.author_reputation >= verified_reputation_min,
            product_id: draft.product_id,
            author_address: draft.author_address,
            rating: draft.rating,
            content: draft.content,
            images: draft.images,
            ipfs_cid: draft.ipfs_cid,
            created_at,
        })
    }
}

fn validate_rating(rating: u8) -> Result<(), ContractViolation> {
    if !(REVIEW_RATING_MIN..=REVIEW_RATING_MAX).contains(&rating) {
        return Err(ContractViolation::InvalidRange {
            field: "review.rating",
            min: REVIEW_RATING_MIN as i64,
            max: REVIEW_RATING_MAX as i64,
            got: rating as i64,
        });
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ContractViolation> {
    if content.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field: "review.content",
            reason: "must not be empty",
        });
    }
    if content.len() > REVIEW_CONTENT_MAX_BYTES {
        return Err(ContractViolation::InvalidValue {
            field: "review.content",
            reason: "must be <= 8192 bytes",
        });
    }
    Ok(())
}
