//! Rate limit policy and per-check results.

use serde::{Deserialize, Serialize};

/// Rate limiting algorithm named in configuration.
///
/// Only `TokenBucket` is implemented; the others are accepted by the parser
/// so that configuration validation can reject them with a clear message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateLimitStrategy {
    #[default]
    TokenBucket,
    SlidingWindow,
    FixedWindow,
}

/// Effective limit applied to one client on one request.
///
/// `burst_size` defaults to `requests_per_minute` when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRateLimitConfig", rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
    pub burst_size: u64,
    pub strategy: RateLimitStrategy,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawRateLimitConfig {
    requests_per_minute: u64,
    burst_size: Option<u64>,
    #[serde(default)]
    strategy: RateLimitStrategy,
}

impl From<RawRateLimitConfig> for RateLimitConfig {
    fn from(raw: RawRateLimitConfig) -> Self {
        Self {
            requests_per_minute: raw.requests_per_minute,
            burst_size: raw.burst_size.unwrap_or(raw.requests_per_minute),
            strategy: raw.strategy,
        }
    }
}

impl RateLimitConfig {
    /// Token bucket config with burst equal to the per-minute limit.
    pub fn per_minute(requests_per_minute: u64) -> Self {
        Self {
            requests_per_minute,
            burst_size: requests_per_minute,
            strategy: RateLimitStrategy::TokenBucket,
        }
    }

    pub fn with_burst(mut self, burst_size: u64) -> Self {
        self.burst_size = burst_size;
        self
    }

    /// Tokens added per second.
    pub fn refill_rate(&self) -> f64 {
        self.requests_per_minute as f64 / 60.0
    }
}

/// Outcome of one `check_limit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u64,
    /// Epoch milliseconds; `last_refill_time + 60s`
    pub reset_time: u64,
    /// Whole seconds until one more token accrues (0 when allowed)
    pub retry_after_seconds: u64,
}
