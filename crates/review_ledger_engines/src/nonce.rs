#![forbid(unsafe_code)]

use rand::Rng;
use review_ledger_contracts::review::Address;
use review_ledger_contracts::{MonotonicTimeNs, ReviewLedgerError};
use review_ledger_storage::ttl_cache::TtlCache;
use tracing::debug;

const NONCE_ALPHABET: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceIssuerConfig {
    pub ttl_seconds: u64,
    pub token_len: u8,
}

impl NonceIssuerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            ttl_seconds: 300,
            token_len: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub address: Address,
    pub nonce: String,
    pub issued_at: MonotonicTimeNs,
}

/// Single-use login challenges, at most one live per address.
#[derive(Debug)]
pub struct NonceIssuer {
    config: NonceIssuerConfig,
    pending: TtlCache<Address, NonceRecord>,
}

impl NonceIssuer {
    pub fn new(config: NonceIssuerConfig) -> Self {
        Self {
            config,
            pending: TtlCache::new(),
        }
    }

    /// Replaces whatever nonce was pending for `address`.
    pub fn generate_nonce(&self, now: MonotonicTimeNs, address: &Address) -> String {
        let mut rng = rand::thread_rng();
        let nonce: String = (0..self.config.token_len.max(1))
            .map(|_| NONCE_ALPHABET[rng.gen_range(0..NONCE_ALPHABET.len())] as char)
            .collect();
        self.pending.set(
            now,
            address.clone(),
            NonceRecord {
                address: address.clone(),
                nonce: nonce.clone(),
                issued_at: now,
            },
            self.config.ttl_seconds,
        );
        debug!(address = %address, "login nonce issued");
        nonce
    }

    /// Consumes the pending nonce whether or not it matches.
    pub fn verify_nonce(&self, now: MonotonicTimeNs, address: &Address, supplied: &str) -> bool {
        match self.pending.take(now, address) {
            Some(record) => record.nonce == supplied,
            None => false,
        }
    }

    pub fn require_valid_nonce(
        &self,
        now: MonotonicTimeNs,
        address: &Address,
        supplied: &str,
    ) -> Result<(), ReviewLedgerError> {
        if self.verify_nonce(now, address, supplied) {
            Ok(())
        } else {
            Err(ReviewLedgerError::NonceInvalid(address.clone()))
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
