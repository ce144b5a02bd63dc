#![forbid(unsafe_code)]

pub mod repo;
pub mod review_store;
pub mod ttl_cache;
