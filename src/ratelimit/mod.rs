//! Per-client admission control.
//!
//! # Algorithm
//!
//! Token bucket, one bucket per client identifier:
//!
//! - capacity = `burst_size`, starting full
//! - refill = `requests_per_minute / 60` tokens per second, added in whole
//!   tokens only when at least one has accrued
//! - each admitted request consumes one token
//!
//! # Storage
//!
//! [`RateLimiter`] is the seam for bucket storage. [`TokenBucketLimiter`]
//! keeps buckets in process memory and is the only backend; remote stores
//! plug in behind the same trait without changing `check_limit` or
//! `reset_limit`.

mod client_type;
mod clock;
mod token_bucket;

use serde::Serialize;

pub use client_type::ClientType;
pub use clock::{Clock, ManualClock, SystemClock};
pub use token_bucket::TokenBucketLimiter;

use crate::models::{RateLimitConfig, RateLimitResult};

/// Point-in-time view of one client's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BucketStatus {
    pub tokens: u64,
    pub capacity: u64,
    pub refill_rate: f64,
    pub last_refill: u64,
}

/// Client-keyed admission control.
pub trait RateLimiter: Send + Sync {
    /// Consume one token for `client_id`, creating its bucket from `config`
    /// on first use.
    fn check_limit(&self, client_id: &str, config: &RateLimitConfig) -> RateLimitResult;

    /// Drop the client's bucket; the next check starts with full burst.
    fn reset_limit(&self, client_id: &str);

    /// Refill and report a bucket without consuming a token.
    fn bucket_status(&self, client_id: &str) -> Option<BucketStatus>;

    /// Status of every live bucket.
    fn all_bucket_status(&self) -> Vec<(String, BucketStatus)>;

    /// Number of live buckets.
    fn active_buckets(&self) -> usize;
}
