#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use review_ledger_engines::nonce::NonceIssuerConfig;
use review_ledger_engines::vote_guard::VOTE_TTL_SECONDS_DEFAULT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewLedgerConfig {
    pub upload_delay_ms: u64,
    pub upload_queue_capacity: usize,
    pub vote_ttl_seconds: u64,
    pub nonce: NonceIssuerConfig,
    pub verified_reputation_min: u32,
}

impl ReviewLedgerConfig {
    pub fn mvp_v1() -> Self {
        Self {
            upload_delay_ms: 2_000,
            upload_queue_capacity: 256,
            vote_ttl_seconds: VOTE_TTL_SECONDS_DEFAULT,
            nonce: NonceIssuerConfig::mvp_v1(),
            verified_reputation_min: 50,
        }
    }

    pub fn from_env() -> Self {
        let base = Self::mvp_v1();
        Self {
            upload_delay_ms: env_u64("REVIEW_LEDGER_UPLOAD_DELAY_MS", 0..=60_000)
                .unwrap_or(base.upload_delay_ms),
            upload_queue_capacity: env_u64("REVIEW_LEDGER_UPLOAD_QUEUE_CAPACITY", 1..=65_536)
                .map(|v| v as usize)
                .unwrap_or(base.upload_queue_capacity),
            vote_ttl_seconds: env_u64("REVIEW_LEDGER_VOTE_TTL_SECONDS", 1..=31_536_000)
                .unwrap_or(base.vote_ttl_seconds),
            nonce: NonceIssuerConfig {
                ttl_seconds: env_u64("REVIEW_LEDGER_NONCE_TTL_SECONDS", 1..=86_400)
                    .unwrap_or(base.nonce.ttl_seconds),
                ..base.nonce
            },
            verified_reputation_min: env_u64("REVIEW_LEDGER_VERIFIED_REPUTATION_MIN", 0..=1_000)
                .map(|v| v as u32)
                .unwrap_or(base.verified_reputation_min),
        }
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }
}

impl Default for ReviewLedgerConfig {
    fn default() -> Self {
        Self::mvp_v1()
    }
}

fn env_u64(name: &str, range: std::ops::RangeInclusive<u64>) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| range.contains(v))
}
