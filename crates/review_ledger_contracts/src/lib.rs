#![forbid(unsafe_code)]

pub mod common;
pub mod error;
pub mod ledger;
pub mod review;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Validate};
pub use error::ReviewLedgerError;
