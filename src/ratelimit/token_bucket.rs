//! In-memory token bucket limiter.
//!
//! # Concurrency
//!
//! Buckets live in a `DashMap<String, Arc<Mutex<TokenBucket>>>`. The map
//! shard is held only long enough to find or create the bucket; refill and
//! decrement then run under that bucket's own mutex. Two requests from the
//! same client are serialized, requests from different clients never wait
//! on each other's bucket.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{BucketStatus, ClientType, Clock, RateLimiter, SystemClock};
use crate::metrics;
use crate::models::{RateLimitConfig, RateLimitResult};

/// Advertised reset horizon after the last refill.
const RESET_WINDOW_MS: u64 = 60_000;

#[derive(Debug)]
struct TokenBucket {
    tokens: u64,
    last_refill_time: u64,
    capacity: u64,
    requests_per_minute: u64,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig, now: u64) -> Self {
        Self {
            tokens: config.burst_size,
            last_refill_time: now,
            capacity: config.burst_size,
            requests_per_minute: config.requests_per_minute,
        }
    }

    /// Tokens per second.
    fn refill_rate(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }

    /// Add whole tokens accrued since the last refill. A clock that moved
    /// backwards adds nothing.
    ///
    /// `floor(elapsed_secs * rpm / 60)`, computed in integer milliseconds so
    /// rates like 20/min do not lose a token to rounding.
    fn refill(&mut self, now: u64) {
        let elapsed_ms = now.saturating_sub(self.last_refill_time);
        let tokens_to_add = elapsed_ms.saturating_mul(self.requests_per_minute) / 60_000;

        if tokens_to_add > 0 {
            self.tokens = self.capacity.min(self.tokens.saturating_add(tokens_to_add));
            self.last_refill_time = now;
        }
    }

    fn reset_time(&self) -> u64 {
        self.last_refill_time.saturating_add(RESET_WINDOW_MS)
    }

    /// Seconds until one more token accrues: `ceil(60 / rpm)`, never below 1
    /// (2s at 30 rpm, 3s at 25 rpm).
    fn retry_after_seconds(&self) -> u64 {
        if self.requests_per_minute == 0 {
            return RESET_WINDOW_MS / 1000;
        }
        60u64.div_ceil(self.requests_per_minute).max(1)
    }

    fn status(&self) -> BucketStatus {
        BucketStatus {
            tokens: self.tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate(),
            last_refill: self.last_refill_time,
        }
    }
}

/// Token bucket limiter with buckets held in process memory.
pub struct TokenBucketLimiter<C: Clock = SystemClock> {
    buckets: DashMap<String, Arc<Mutex<TokenBucket>>>,
    clock: C,
}

impl TokenBucketLimiter<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for TokenBucketLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> TokenBucketLimiter<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    fn bucket(&self, client_id: &str, config: &RateLimitConfig) -> Arc<Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.get(client_id) {
            return bucket.clone();
        }
        let bucket = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| {
                debug!(
                    client_id = %client_id,
                    capacity = config.burst_size,
                    requests_per_minute = config.requests_per_minute,
                    "Creating token bucket"
                );
                Arc::new(Mutex::new(TokenBucket::new(config, self.clock.now_millis())))
            })
            .clone();
        metrics::set_active_buckets(self.buckets.len());
        bucket
    }
}

impl<C: Clock> RateLimiter for TokenBucketLimiter<C> {
    fn check_limit(&self, client_id: &str, config: &RateLimitConfig) -> RateLimitResult {
        let started = Instant::now();
        let bucket = self.bucket(client_id, config);

        let result = {
            let mut bucket = bucket.lock();
            bucket.refill(self.clock.now_millis());

            if bucket.tokens >= 1 {
                bucket.tokens -= 1;
                debug!(client_id = %client_id, remaining = bucket.tokens, "Rate limit allowed");
                RateLimitResult {
                    allowed: true,
                    remaining: bucket.tokens,
                    reset_time: bucket.reset_time(),
                    retry_after_seconds: 0,
                }
            } else {
                warn!(client_id = %client_id, "Rate limit exceeded");
                RateLimitResult {
                    allowed: false,
                    remaining: 0,
                    reset_time: bucket.reset_time(),
                    retry_after_seconds: bucket.retry_after_seconds(),
                }
            }
        };

        metrics::record_rate_limit_check(
            ClientType::classify(client_id).as_str(),
            result.allowed,
            started.elapsed().as_secs_f64(),
        );
        result
    }

    fn reset_limit(&self, client_id: &str) {
        self.buckets.remove(client_id);
        metrics::set_active_buckets(self.buckets.len());
        info!(client_id = %client_id, "Reset rate limit");
    }

    fn bucket_status(&self, client_id: &str) -> Option<BucketStatus> {
        let bucket = self.buckets.get(client_id)?.clone();
        let mut bucket = bucket.lock();
        bucket.refill(self.clock.now_millis());
        Some(bucket.status())
    }

    fn all_bucket_status(&self) -> Vec<(String, BucketStatus)> {
        let clients: Vec<String> = self.buckets.iter().map(|e| e.key().clone()).collect();
        clients
            .into_iter()
            .filter_map(|id| self.bucket_status(&id).map(|status| (id, status)))
            .collect()
    }

    fn active_buckets(&self) -> usize {
        self.buckets.len()
    }
}
