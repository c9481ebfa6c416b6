use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RateLimitConfig, RouteDefinition, ServiceInstance};
use crate::ratelimit::{BucketStatus, ClientType};

/// Error response body for JSON endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Body of a 429 from the rate limit gate.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedResponse {
    pub error: String,
    pub message: String,
    /// Seconds until one more token accrues
    pub retry_after: u64,
    /// Epoch milliseconds
    pub reset_time: u64,
}

impl RateLimitedResponse {
    pub fn new(requests_per_minute: u64, retry_after: u64, reset_time: u64) -> Self {
        Self {
            error: "Rate limit exceeded".to_string(),
            message: format!(
                "Too many requests. Limit: {requests_per_minute} requests per minute"
            ),
            retry_after,
            reset_time,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    /// Number of configured routes
    pub routes: usize,
    /// Number of services with at least one healthy instance
    pub services: usize,
}

/// Static service description served on `/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub service: String,
    pub version: String,
    pub features: Vec<String>,
    pub status: String,
    pub uptime_seconds: u64,
}

/// One configured route as reported by `/debug/routes`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RouteSummary {
    pub id: String,
    pub path: String,
    pub service_name: String,
    pub load_balancing_strategy: String,
    pub strip_prefix: bool,
    pub retry_attempts: u32,
    pub timeout_ms: u64,
}

impl From<&RouteDefinition> for RouteSummary {
    fn from(route: &RouteDefinition) -> Self {
        Self {
            id: route.id.clone(),
            path: route.path.clone(),
            service_name: route.service_name.clone(),
            load_balancing_strategy: route.load_balancing_strategy.as_str().to_string(),
            strip_prefix: route.strip_prefix,
            retry_attempts: route.retry_attempts,
            timeout_ms: route.timeout_ms,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoutesResponse {
    pub configured_routes: Vec<RouteSummary>,
    pub total_routes: usize,
}

/// Healthy instances grouped by service, ordered by service name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub registered_services: BTreeMap<String, Vec<ServiceInstance>>,
    pub total_services: usize,
    pub total_instances: usize,
}

/// Body of `PUT /debug/services/{id}/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthUpdateRequest {
    pub healthy: bool,
}

/// Live state of one client's token bucket.
#[derive(Debug, Serialize, Deserialize)]
pub struct BucketStatusResponse {
    pub client_id: String,
    pub client_type: String,
    pub tokens: u64,
    pub capacity: u64,
    /// Tokens per second
    pub refill_rate: f64,
    /// Epoch milliseconds of the last refill
    pub last_refill: u64,
}

impl BucketStatusResponse {
    pub fn new(client_id: String, status: BucketStatus) -> Self {
        Self {
            client_type: ClientType::classify(&client_id).as_str().to_string(),
            client_id,
            tokens: status.tokens,
            capacity: status.capacity,
            refill_rate: status.refill_rate,
            last_refill: status.last_refill,
        }
    }
}

/// Rate limiting configuration and bucket overview for `/debug/ratelimit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitSummaryResponse {
    pub enabled: bool,
    pub skip_debug_endpoints: bool,
    pub default_limit: RateLimitConfig,
    /// Reported only; not enforced
    pub global_limit: RateLimitConfig,
    pub user_limits: BTreeMap<String, RateLimitConfig>,
    pub path_limits: BTreeMap<String, RateLimitConfig>,
    pub storage: String,
    pub active_buckets: usize,
    pub buckets: Vec<BucketStatusResponse>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_response_shape() {
        let body = RateLimitedResponse::new(60, 1, 1_700_000_060_000);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "error": "Rate limit exceeded",
                "message": "Too many requests. Limit: 60 requests per minute",
                "retryAfter": 1,
                "resetTime": 1_700_000_060_000u64
            })
        );
    }

    #[test]
    fn test_route_summary_from_definition() {
        let route = RouteDefinition::new("catalog", "/gateway/catalog/**", "catalog")
            .with_timeout_ms(500);
        let summary = RouteSummary::from(&route);

        assert_eq!(summary.load_balancing_strategy, "ROUND_ROBIN");
        assert_eq!(summary.timeout_ms, 500);
        assert!(summary.strip_prefix);
    }

    #[test]
    fn test_bucket_status_response_classifies_client() {
        let status = BucketStatus {
            tokens: 3,
            capacity: 10,
            refill_rate: 1.0,
            last_refill: 42,
        };
        let response = BucketStatusResponse::new("10.0.0.7".to_string(), status);
        assert_eq!(response.client_type, "ip_based");
        assert_eq!(response.tokens, 3);
    }
}
