#![forbid(unsafe_code)]

use std::env;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use review_ledger_contracts::ledger::{LedgerRecord, LedgerSubmission};
use review_ledger_contracts::review::{CorrelationId, TxHash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const LEDGER_ERROR_MESSAGE_MAX_CHARS: usize = 256;
pub const IN_MEMORY_LEDGER_SUBMITTER: &str = "review_ledger_service";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("ledger rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("ledger response decode failed: {0}")]
    Decode(String),
}

/// The three ledger operations reconciliation depends on. All calls block
/// until the ledger answers or the client's own timeout fires.
pub trait LedgerClient: Send + Sync {
    fn submit(&self, submission: &LedgerSubmission) -> Result<TxHash, LedgerError>;
    fn total_count(&self) -> Result<u64, LedgerError>;
    fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<LedgerRecord>, LedgerError>;
}

/// Append-only in-process ledger. The N-th appended record carries
/// correlation id N, so "count after submit" names the newest record.
#[derive(Debug)]
pub struct InMemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
    submitter: String,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(IN_MEMORY_LEDGER_SUBMITTER)
    }
}

impl InMemoryLedger {
    pub fn new(submitter: impl Into<String>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            submitter: submitter.into(),
        }
    }

    fn records_guard(&self) -> MutexGuard<'_, Vec<LedgerRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends on behalf of another writer sharing the same ledger.
    pub fn append_external(
        &self,
        submission: &LedgerSubmission,
        submitter: &str,
    ) -> Result<TxHash, LedgerError> {
        let mut records = self.records_guard();
        let seq = records.len() as u64 + 1;
        let tx_hash = TxHash::new(derive_tx_hash(seq, submission))
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        records.push(LedgerRecord {
            correlation_id: CorrelationId(seq),
            tx_hash: tx_hash.clone(),
            product_id: submission.product_id.clone(),
            content: submission.content.clone(),
            rating: submission.rating,
            submitter: Some(submitter.to_string()),
        });
        Ok(tx_hash)
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records_guard().clone()
    }

    pub fn len(&self) -> usize {
        self.records_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerClient for InMemoryLedger {
    fn submit(&self, submission: &LedgerSubmission) -> Result<TxHash, LedgerError> {
        self.append_external(submission, &self.submitter)
    }

    fn total_count(&self) -> Result<u64, LedgerError> {
        Ok(self.len() as u64)
    }

    fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        Ok(self
            .records_guard()
            .iter()
            .find(|r| r.correlation_id == correlation_id)
            .cloned())
    }
}

fn derive_tx_hash(seq: u64, submission: &LedgerSubmission) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_be_bytes());
    hasher.update(submission.product_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(submission.content.as_bytes());
    hasher.update([0u8, submission.rating]);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(2 + digest.len() * 2);
    out.push_str("0x");
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerHttpClientConfig {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl LedgerHttpClientConfig {
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("REVIEW_LEDGER_GATEWAY_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return None;
        }
        let bearer_token = env::var("REVIEW_LEDGER_GATEWAY_BEARER").ok().and_then(|v| {
            let s = v.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        });
        let connect_timeout_ms = env::var("REVIEW_LEDGER_GATEWAY_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| (100..=60_000).contains(v))
            .unwrap_or(3_000);
        let request_timeout_ms = env::var("REVIEW_LEDGER_GATEWAY_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| (100..=120_000).contains(v))
            .unwrap_or(10_000);

        Some(Self {
            endpoint,
            bearer_token,
            connect_timeout_ms,
            request_timeout_ms,
        })
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_millis(self.connect_timeout_ms))
            .timeout_read(Duration::from_millis(self.request_timeout_ms))
            .timeout_write(Duration::from_millis(self.request_timeout_ms))
            .build();
        let url = format!("{}/{}", self.endpoint, path);
        let mut req = agent.request(method, &url).set("accept", "application/json");
        if let Some(token) = self.bearer_token.as_ref() {
            req = req.set("authorization", &format!("Bearer {}", token));
        }
        req
    }
}

#[derive(Debug, Clone)]
pub enum LedgerClientRuntime {
    InMemory(Arc<InMemoryLedger>),
    Http(LedgerHttpClientConfig),
    AlwaysFail { message: String },
}

impl Default for LedgerClientRuntime {
    fn default() -> Self {
        Self::from_env_or_in_memory()
    }
}

impl LedgerClientRuntime {
    pub fn from_env_or_in_memory() -> Self {
        if let Some(config) = LedgerHttpClientConfig::from_env() {
            return Self::Http(config);
        }
        Self::in_memory()
    }

    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryLedger::default()))
    }

    pub fn always_fail(message: &str) -> Self {
        Self::AlwaysFail {
            message: message.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in_memory",
            Self::Http(_) => "http",
            Self::AlwaysFail { .. } => "always_fail",
        }
    }
}

impl LedgerClient for LedgerClientRuntime {
    fn submit(&self, submission: &LedgerSubmission) -> Result<TxHash, LedgerError> {
        match self {
            Self::InMemory(ledger) => ledger.submit(submission),
            Self::Http(config) => http_submit(config, submission),
            Self::AlwaysFail { message } => Err(LedgerError::Transport(message.clone())),
        }
    }

    fn total_count(&self) -> Result<u64, LedgerError> {
        match self {
            Self::InMemory(ledger) => ledger.total_count(),
            Self::Http(config) => http_total_count(config),
            Self::AlwaysFail { message } => Err(LedgerError::Transport(message.clone())),
        }
    }

    fn get_by_correlation_id(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<LedgerRecord>, LedgerError> {
        match self {
            Self::InMemory(ledger) => ledger.get_by_correlation_id(correlation_id),
            Self::Http(config) => http_get_by_correlation_id(config, correlation_id),
            Self::AlwaysFail { message } => Err(LedgerError::Transport(message.clone())),
        }
    }
}

/// Gateway wire format: camelCase JSON in both directions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest<'a> {
    product_id: &'a str,
    content: &'a str,
    rating: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitReply {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct CountReply {
    total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordReply {
    correlation_id: u64,
    tx_hash: String,
    product_id: String,
    content: String,
    rating: u8,
    #[serde(default)]
    submitter: Option<String>,
}

impl RecordReply {
    fn into_record(self, requested: CorrelationId) -> Result<LedgerRecord, LedgerError> {
        if self.correlation_id != requested.0 {
            return Err(LedgerError::Decode(format!(
                "asked for record {} but gateway returned {}",
                requested.0, self.correlation_id
            )));
        }
        Ok(LedgerRecord {
            correlation_id: requested,
            tx_hash: TxHash::new(self.tx_hash).map_err(|e| LedgerError::Decode(e.to_string()))?,
            product_id: self.product_id,
            content: self.content,
            rating: self.rating,
            submitter: self.submitter,
        })
    }
}

fn http_submit(
    config: &LedgerHttpClientConfig,
    submission: &LedgerSubmission,
) -> Result<TxHash, LedgerError> {
    let payload = serde_json::to_string(&SubmitRequest {
        product_id: &submission.product_id,
        content: &submission.content,
        rating: submission.rating,
    })
    .map_err(|err| LedgerError::Decode(format!("submission encode failed: {}", err)))?;
    let resp = config
        .request("POST", "reviews")
        .set("content-type", "application/json")
        .send_string(&payload)
        .map_err(map_ureq_error)?;
    let reply: SubmitReply = resp
        .into_json()
        .map_err(|err| LedgerError::Decode(err.to_string()))?;
    TxHash::new(reply.tx_hash).map_err(|err| LedgerError::Decode(err.to_string()))
}

fn http_total_count(config: &LedgerHttpClientConfig) -> Result<u64, LedgerError> {
    let resp = config
        .request("GET", "reviews/count")
        .call()
        .map_err(map_ureq_error)?;
    let reply: CountReply = resp
        .into_json()
        .map_err(|err| LedgerError::Decode(err.to_string()))?;
    Ok(reply.total)
}

fn http_get_by_correlation_id(
    config: &LedgerHttpClientConfig,
    correlation_id: CorrelationId,
) -> Result<Option<LedgerRecord>, LedgerError> {
    match config
        .request("GET", &format!("reviews/{}", correlation_id.0))
        .call()
    {
        Ok(resp) => resp
            .into_json::<RecordReply>()
            .map_err(|err| LedgerError::Decode(err.to_string()))?
            .into_record(correlation_id)
            .map(Some),
        Err(ureq::Error::Status(404, _)) => Ok(None),
        Err(err) => Err(map_ureq_error(err)),
    }
}

fn map_ureq_error(err: ureq::Error) -> LedgerError {
    match err {
        ureq::Error::Status(status, resp) => LedgerError::Rejected {
            status,
            message: bounded_message(resp.into_string().unwrap_or_default()),
        },
        ureq::Error::Transport(err) => LedgerError::Transport(bounded_message(err.to_string())),
    }
}

fn bounded_message(msg: String) -> String {
    if msg.chars().count() > LEDGER_ERROR_MESSAGE_MAX_CHARS {
        msg.chars().take(LEDGER_ERROR_MESSAGE_MAX_CHARS).collect()
    } else {
        msg
    }
}
