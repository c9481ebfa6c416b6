//! Prometheus metrics for gateway observability.
//!
//! Metrics are exposed via a dedicated HTTP listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gateway_ratelimit_requests_allowed_total` - Admitted checks (label: client_type)
//! - `gateway_ratelimit_requests_denied_total` - Denied checks (label: client_type)
//! - `gateway_requests_forwarded_total` - Upstream responses (labels: service, status)
//! - `gateway_routing_failures_total` - Requests ended by a routing error (label: kind)
//!
//! ## Histograms
//! - `gateway_ratelimit_check_duration_seconds` - Time spent in a bucket check
//! - `gateway_forward_duration_seconds` - Upstream call duration (label: service)
//!
//! ## Gauges
//! - `gateway_ratelimit_active_buckets` - Live token buckets
//!
//! # Usage
//!
//! ```rust,ignore
//! use api_gateway::metrics::{try_init_metrics, record_forwarded};
//!
//! try_init_metrics("0.0.0.0:9090".parse()?);
//! record_forwarded("catalog", 200, 0.012);
//! ```
//!
//! Recording before initialization is a no-op, so library code and tests
//! call the helpers unconditionally.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const RATELIMIT_ALLOWED_TOTAL: &str = "gateway_ratelimit_requests_allowed_total";
    pub const RATELIMIT_DENIED_TOTAL: &str = "gateway_ratelimit_requests_denied_total";
    pub const RATELIMIT_CHECK_DURATION_SECONDS: &str = "gateway_ratelimit_check_duration_seconds";
    pub const RATELIMIT_ACTIVE_BUCKETS: &str = "gateway_ratelimit_active_buckets";
    pub const REQUESTS_FORWARDED_TOTAL: &str = "gateway_requests_forwarded_total";
    pub const FORWARD_DURATION_SECONDS: &str = "gateway_forward_duration_seconds";
    pub const ROUTING_FAILURES_TOTAL: &str = "gateway_routing_failures_total";
}

/// Initialize the Prometheus metrics exporter.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. the port is
/// taken or a recorder is already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::RATELIMIT_ALLOWED_TOTAL,
        "Number of requests allowed by the rate limiter"
    );
    describe_counter!(
        names::RATELIMIT_DENIED_TOTAL,
        "Number of requests denied by the rate limiter"
    );
    describe_counter!(
        names::REQUESTS_FORWARDED_TOTAL,
        "Number of requests forwarded upstream, by upstream status"
    );
    describe_counter!(
        names::ROUTING_FAILURES_TOTAL,
        "Number of requests that ended in a routing or forwarding error"
    );

    describe_histogram!(
        names::RATELIMIT_CHECK_DURATION_SECONDS,
        "Time taken to check a rate limit in seconds"
    );
    describe_histogram!(
        names::FORWARD_DURATION_SECONDS,
        "Upstream call duration in seconds"
    );

    describe_gauge!(
        names::RATELIMIT_ACTIVE_BUCKETS,
        "Number of live token buckets"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record one rate limit decision and how long the check took.
pub fn record_rate_limit_check(client_type: &'static str, allowed: bool, duration_secs: f64) {
    histogram!(names::RATELIMIT_CHECK_DURATION_SECONDS).record(duration_secs);
    let name = if allowed {
        names::RATELIMIT_ALLOWED_TOTAL
    } else {
        names::RATELIMIT_DENIED_TOTAL
    };
    counter!(name, "client_type" => client_type).increment(1);
}

/// Update the live bucket gauge.
pub fn set_active_buckets(count: usize) {
    gauge!(names::RATELIMIT_ACTIVE_BUCKETS).set(count as f64);
}

/// Record an upstream response.
pub fn record_forwarded(service: &str, status: u16, duration_secs: f64) {
    counter!(names::REQUESTS_FORWARDED_TOTAL, "service" => service.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::FORWARD_DURATION_SECONDS, "service" => service.to_string())
        .record(duration_secs);
}

/// Record a request that ended in a gateway error.
pub fn record_routing_failure(kind: &'static str) {
    counter!(names::ROUTING_FAILURES_TOTAL, "kind" => kind).increment(1);
}
