#![forbid(unsafe_code)]

use std::sync::Arc;

use review_ledger_contracts::review::{Address, ReviewDraft, ReviewId};
use review_ledger_contracts::{MonotonicTimeNs, ReviewLedgerError};
use review_ledger_engines::ledger_client::LedgerClient;
use review_ledger_engines::nonce::NonceIssuer;
use review_ledger_engines::reconcile::{ReconcileResult, ReconciliationEngine};
use review_ledger_engines::vote_guard::{VoteDedupGuard, VoteTally};
use review_ledger_storage::repo::ReviewRepo;
use tokio::runtime::Handle;
use tracing::warn;

use crate::config::ReviewLedgerConfig;
use crate::intake::{self, ReviewCreated};
use crate::repair::{IdRepairHeuristic, RepairReport};
use crate::status::{self, LedgerStatusView, SyncedReviewPage};
use crate::sweeper::{BatchSweeper, SweepReport};
use crate::upload_scheduler::{AsyncUploadScheduler, ScheduleOutcome};

/// Every caller-facing review-ledger operation, wired over one store and one
/// ledger client. Caches live here, not in statics.
pub struct ReviewLedgerRuntime {
    config: ReviewLedgerConfig,
    store: Arc<dyn ReviewRepo>,
    ledger: Arc<dyn LedgerClient>,
    engine: ReconciliationEngine,
    scheduler: AsyncUploadScheduler,
    sweeper: BatchSweeper,
    repair: IdRepairHeuristic,
    nonces: NonceIssuer,
    votes: VoteDedupGuard,
}

impl ReviewLedgerRuntime {
    /// `handle` hosts the background upload workers.
    pub fn new(
        handle: &Handle,
        config: ReviewLedgerConfig,
        store: Arc<dyn ReviewRepo>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        let engine = ReconciliationEngine::new(store.clone(), ledger.clone());
        Self {
            scheduler: AsyncUploadScheduler::spawn(handle, engine.clone(), &config),
            sweeper: BatchSweeper::new(store.clone(), engine.clone()),
            repair: IdRepairHeuristic::new(store.clone(), ledger.clone()),
            nonces: NonceIssuer::new(config.nonce),
            votes: VoteDedupGuard::new(config.vote_ttl_seconds),
            config,
            store,
            ledger,
            engine,
        }
    }

    pub fn config(&self) -> &ReviewLedgerConfig {
        &self.config
    }

    /// Persists the review and queues its upload. Succeeds once the local
    /// write does, whatever happens on the ledger later.
    pub fn create_review(
        &self,
        now: MonotonicTimeNs,
        draft: ReviewDraft,
    ) -> Result<ReviewCreated, ReviewLedgerError> {
        let mut created = intake::create_review(
            self.store.as_ref(),
            now,
            draft,
            self.config.verified_reputation_min,
        )?;
        let outcome = self.schedule_async_upload(created.review_id);
        if !outcome.is_enqueued() {
            warn!(
                review_id = created.review_id.0,
                outcome = ?outcome,
                "review stored without a queued upload; the sweep will pick it up"
            );
        }
        created.upload_enqueued = outcome.is_enqueued();
        Ok(created)
    }

    pub fn submit_one(&self, review_id: ReviewId) -> ReconcileResult {
        self.engine.submit(review_id)
    }

    pub fn schedule_async_upload(&self, review_id: ReviewId) -> ScheduleOutcome {
        self.scheduler.schedule(review_id)
    }

    pub fn sweep_unsynced(&self) -> SweepReport {
        self.sweeper.sweep_unsynced()
    }

    pub fn repair_half_synced(&self) -> RepairReport {
        self.repair.repair_half_synced()
    }

    pub fn issue_nonce(&self, now: MonotonicTimeNs, address: &Address) -> String {
        self.nonces.generate_nonce(now, address)
    }

    pub fn verify_nonce(&self, now: MonotonicTimeNs, address: &Address, supplied: &str) -> bool {
        self.nonces.verify_nonce(now, address, supplied)
    }

    pub fn register_vote(
        &self,
        now: MonotonicTimeNs,
        review_id: ReviewId,
        address: &Address,
        is_helpful: bool,
    ) -> Result<VoteTally, ReviewLedgerError> {
        self.votes
            .register_vote(now, self.store.as_ref(), review_id, address, is_helpful)
    }

    pub fn ledger_status(&self, review_id: ReviewId) -> Result<LedgerStatusView, ReviewLedgerError> {
        status::ledger_status(self.store.as_ref(), self.ledger.as_ref(), review_id)
    }

    pub fn list_synced(&self, page: u32, page_size: u32) -> Result<SyncedReviewPage, ReviewLedgerError> {
        status::list_synced(self.store.as_ref(), page, page_size)
    }
}
