//! Failure descriptions and log rate limiting.

pub mod events;
pub mod failure_log;
