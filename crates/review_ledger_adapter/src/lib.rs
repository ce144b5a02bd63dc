#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use review_ledger_contracts::review::{Address, ProductId, ReviewDraft, ReviewId};
use review_ledger_contracts::MonotonicTimeNs;
use review_ledger_engines::ledger_client::LedgerClientRuntime;
use review_ledger_engines::reconcile::ReconcileResult;
use review_ledger_os::config::ReviewLedgerConfig;
use review_ledger_os::runtime::ReviewLedgerRuntime;
use review_ledger_os::status::{LedgerStatusView, SyncedReviewPage};
use review_ledger_os::sweeper::{SweepItemStatus, SweepReport};
use review_ledger_storage::review_store::ReviewLedgerStore;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreateReviewAdapterRequest {
    pub product_id: u64,
    pub author_address: String,
    pub rating: u8,
    pub content: String,
    pub images: Option<String>,
    pub ipfs_cid: Option<String>,
    pub author_reputation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CreateReviewAdapterResponse {
    pub status: String,
    pub review_id: u64,
    pub nft_id: String,
    pub upload_enqueued: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SubmitOneAdapterResponse {
    pub code: i32,
    pub review_id: u64,
    pub tx_hash: Option<String>,
    pub correlation_id: Option<u64>,
    pub reason_code: u32,
    pub message: String,
}

impl From<&ReconcileResult> for SubmitOneAdapterResponse {
    fn from(result: &ReconcileResult) -> Self {
        Self {
            code: result.code(),
            review_id: result.review_id.0,
            tx_hash: result.tx_hash.as_ref().map(|t| t.as_str().to_string()),
            correlation_id: result.correlation_id.map(|c| c.0),
            reason_code: result.reason_code.0,
            message: result.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepAdapterItem {
    pub review_id: u64,
    pub status: String,
    pub result: SubmitOneAdapterResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepAdapterResponse {
    pub code: i32,
    pub message: String,
    pub success_count: u32,
    pub fail_count: u32,
    pub details: Vec<SweepAdapterItem>,
}

impl From<&SweepReport> for SweepAdapterResponse {
    fn from(report: &SweepReport) -> Self {
        Self {
            code: report.code,
            message: report.message.clone(),
            success_count: report.success_count,
            fail_count: report.fail_count,
            details: report
                .details
                .iter()
                .map(|item| SweepAdapterItem {
                    review_id: item.review_id.0,
                    status: match item.status {
                        SweepItemStatus::Success => "success",
                        SweepItemStatus::Failed => "failed",
                    }
                    .to_string(),
                    result: SubmitOneAdapterResponse::from(&item.result),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RepairAdapterResponse {
    pub code: i32,
    pub message: String,
    pub fixed_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IssueNonceAdapterResponse {
    pub address: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerifyNonceAdapterRequest {
    pub address: String,
    pub nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VerifyNonceAdapterResponse {
    pub address: String,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoteAdapterRequest {
    pub review_id: u64,
    pub address: String,
    pub is_helpful: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VoteAdapterResponse {
    pub review_id: u64,
    pub helpful_votes: u32,
    pub unhelpful_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
pub struct AdapterSweepWorkerCounters {
    pub pass_count: u64,
    pub success_total: u64,
    pub fail_total: u64,
    pub last_pass_at_ns: Option<u64>,
    pub last_code: Option<i32>,
}

/// One line of the service ingress, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AdapterCommand {
    CreateReview(CreateReviewAdapterRequest),
    SubmitOne { review_id: u64 },
    SweepUnsynced,
    RepairHalfSynced,
    IssueNonce { address: String },
    VerifyNonce(VerifyNonceAdapterRequest),
    RegisterVote(VoteAdapterRequest),
    LedgerStatus { review_id: u64 },
    ListSynced { page: u32, page_size: u32 },
}

#[derive(Clone)]
pub struct AdapterRuntime {
    runtime: Arc<ReviewLedgerRuntime>,
    ledger_label: &'static str,
    sweep_counters: Arc<Mutex<AdapterSweepWorkerCounters>>,
}

impl AdapterRuntime {
    pub fn new(runtime: ReviewLedgerRuntime, ledger_label: &'static str) -> Self {
        Self {
            runtime: Arc::new(runtime),
            ledger_label,
            sweep_counters: Arc::new(Mutex::new(AdapterSweepWorkerCounters::default())),
        }
    }

    /// In-memory store; ledger gateway from `REVIEW_LEDGER_GATEWAY_*` when set.
    pub fn default_from_env(handle: &Handle) -> Self {
        let config = ReviewLedgerConfig::from_env();
        let ledger = LedgerClientRuntime::from_env_or_in_memory();
        let ledger_label = ledger.label();
        info!(
            ledger = ledger_label,
            upload_delay_ms = config.upload_delay_ms,
            "review ledger adapter configured"
        );
        let runtime = ReviewLedgerRuntime::new(
            handle,
            config,
            Arc::new(ReviewLedgerStore::new_in_memory()),
            Arc::new(ledger),
        );
        Self::new(runtime, ledger_label)
    }

    pub fn ledger_label(&self) -> &'static str {
        self.ledger_label
    }

    pub fn run_create_review(
        &self,
        request: CreateReviewAdapterRequest,
        now_ns: Option<u64>,
    ) -> Result<CreateReviewAdapterResponse, String> {
        let draft = ReviewDraft::v1(
            ProductId(request.product_id),
            parse_address(request.author_address)?,
            request.rating,
            request.content,
            request.author_reputation,
        )
        .map_err(|e| e.to_string())?
        .with_attachments(request.images, request.ipfs_cid);
        let created = self
            .runtime
            .create_review(resolve_now(now_ns), draft)
            .map_err(|e| e.to_string())?;
        Ok(CreateReviewAdapterResponse {
            status: "ok".to_string(),
            review_id: created.review_id.0,
            nft_id: created.nft_id.as_str().to_string(),
            upload_enqueued: created.upload_enqueued,
        })
    }

    pub fn run_submit_one(&self, review_id: u64) -> SubmitOneAdapterResponse {
        SubmitOneAdapterResponse::from(&self.runtime.submit_one(ReviewId(review_id)))
    }

    pub fn run_sweep_unsynced(&self) -> SweepAdapterResponse {
        SweepAdapterResponse::from(&self.runtime.sweep_unsynced())
    }

    pub fn run_repair_half_synced(&self) -> RepairAdapterResponse {
        let report = self.runtime.repair_half_synced();
        RepairAdapterResponse {
            code: report.code,
            message: report.message,
            fixed_count: report.fixed_count,
        }
    }

    pub fn run_issue_nonce(
        &self,
        address: String,
        now_ns: Option<u64>,
    ) -> Result<IssueNonceAdapterResponse, String> {
        let address = parse_address(address)?;
        let nonce = self.runtime.issue_nonce(resolve_now(now_ns), &address);
        Ok(IssueNonceAdapterResponse {
            address: address.as_str().to_string(),
            nonce,
        })
    }

    pub fn run_verify_nonce(
        &self,
        request: VerifyNonceAdapterRequest,
        now_ns: Option<u64>,
    ) -> Result<VerifyNonceAdapterResponse, String> {
        let address = parse_address(request.address)?;
        let valid = self
            .runtime
            .verify_nonce(resolve_now(now_ns), &address, &request.nonce);
        Ok(VerifyNonceAdapterResponse {
            address: address.as_str().to_string(),
            valid,
        })
    }

    pub fn run_register_vote(
        &self,
        request: VoteAdapterRequest,
        now_ns: Option<u64>,
    ) -> Result<VoteAdapterResponse, String> {
        let address = parse_address(request.address)?;
        let tally = self
            .runtime
            .register_vote(
                resolve_now(now_ns),
                ReviewId(request.review_id),
                &address,
                request.is_helpful,
            )
            .map_err(|e| e.to_string())?;
        Ok(VoteAdapterResponse {
            review_id: tally.review_id.0,
            helpful_votes: tally.helpful_votes,
            unhelpful_votes: tally.unhelpful_votes,
        })
    }

    pub fn run_ledger_status(&self, review_id: u64) -> Result<LedgerStatusView, String> {
        self.runtime
            .ledger_status(ReviewId(review_id))
            .map_err(|e| e.to_string())
    }

    pub fn run_list_synced(&self, page: u32, page_size: u32) -> Result<SyncedReviewPage, String> {
        self.runtime
            .list_synced(page, page_size)
            .map_err(|e| e.to_string())
    }

    /// One periodic sweep; folds the outcome into the worker counters.
    pub fn run_sweep_worker_pass(&self, now_ns: Option<u64>) -> Result<SweepAdapterResponse, String> {
        let response = self.run_sweep_unsynced();
        let mut counters = self
            .sweep_counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        counters.pass_count = counters.pass_count.saturating_add(1);
        counters.success_total = counters
            .success_total
            .saturating_add(u64::from(response.success_count));
        counters.fail_total = counters
            .fail_total
            .saturating_add(u64::from(response.fail_count));
        counters.last_pass_at_ns = Some(now_ns.unwrap_or_else(system_time_now_ns));
        counters.last_code = Some(response.code);
        if response.code < 0 {
            return Err(response.message);
        }
        Ok(response)
    }

    pub fn sweep_worker_counters(&self) -> AdapterSweepWorkerCounters {
        self.sweep_counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Periodic sweep over the same store the intake writes to. Runs until aborted.
    pub fn spawn_sweep_worker(&self, handle: &Handle, interval: Duration) -> JoinHandle<()> {
        let adapter = self.clone();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let worker = adapter.clone();
                match tokio::task::spawn_blocking(move || worker.run_sweep_worker_pass(None)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(err)) => warn!(error = %err, "sweep worker pass failed"),
                    Err(err) => warn!(error = %err, "sweep worker pass panicked"),
                }
            }
        })
    }

    pub fn run_command(&self, command: AdapterCommand, now_ns: Option<u64>) -> Result<Value, String> {
        match command {
            AdapterCommand::CreateReview(request) => to_json(self.run_create_review(request, now_ns)?),
            AdapterCommand::SubmitOne { review_id } => to_json(self.run_submit_one(review_id)),
            AdapterCommand::SweepUnsynced => to_json(self.run_sweep_unsynced()),
            AdapterCommand::RepairHalfSynced => to_json(self.run_repair_half_synced()),
            AdapterCommand::IssueNonce { address } => to_json(self.run_issue_nonce(address, now_ns)?),
            AdapterCommand::VerifyNonce(request) => to_json(self.run_verify_nonce(request, now_ns)?),
            AdapterCommand::RegisterVote(request) => to_json(self.run_register_vote(request, now_ns)?),
            AdapterCommand::LedgerStatus { review_id } => to_json(self.run_ledger_status(review_id)?),
            AdapterCommand::ListSynced { page, page_size } => {
                to_json(self.run_list_synced(page, page_size)?)
            }
        }
    }

    /// Decodes one JSON line, runs it, and encodes the reply envelope.
    pub fn run_command_line(&self, line: &str) -> String {
        let reply = serde_json::from_str::<AdapterCommand>(line.trim())
            .map_err(|e| format!("bad command: {e}"))
            .and_then(|command| self.run_command(command, None));
        let envelope = match reply {
            Ok(result) => serde_json::json!({ "status": "ok", "result": result }),
            Err(reason) => serde_json::json!({ "status": "error", "reason": reason }),
        };
        envelope.to_string()
    }
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn parse_address(raw: String) -> Result<Address, String> {
    Address::new(raw.trim()).map_err(|e| e.to_string())
}

fn resolve_now(now_ns: Option<u64>) -> MonotonicTimeNs {
    MonotonicTimeNs(now_ns.unwrap_or_else(system_time_now_ns))
}

fn system_time_now_ns() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(1);
    if nanos > u64::MAX as u128 {
        u64::MAX
    } else {
        nanos as u64
    }
}
