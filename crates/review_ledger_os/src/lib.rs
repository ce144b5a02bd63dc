#![forbid(unsafe_code)]

pub mod config;
pub mod intake;
pub mod repair;
pub mod runtime;
pub mod status;
pub mod sweeper;
pub mod upload_scheduler;
