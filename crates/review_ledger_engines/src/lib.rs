#![forbid(unsafe_code)]

pub mod ledger_client;
pub mod nonce;
pub mod reconcile;
pub mod vote_guard;
