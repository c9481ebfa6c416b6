//! Outbound HTTP calls to backend instances.
//!
//! # Retries
//!
//! A transport failure (connect error, reset, timeout) on an idempotent
//! method (GET, PUT, DELETE) is retried immediately against the same
//! instance, up to the route's `retry_attempts`. POST is attempted once.
//! Upstream error statuses are responses, not failures, and are passed
//! through without retrying.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, Response, header};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, GatewayError};
use crate::metrics;
use crate::models::{RouteDefinition, ServiceInstance};

/// Request headers never copied upstream. The body is re-framed, so the
/// client's framing headers do not apply.
fn skip_request_header(name: &HeaderName) -> bool {
    *name == header::HOST || *name == header::CONTENT_LENGTH || *name == header::TRANSFER_ENCODING
}

/// Hop-by-hop response headers dropped before replying.
fn skip_response_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION
        || *name == header::TRANSFER_ENCODING
        || *name == header::CONTENT_LENGTH
}

/// Methods the gateway forwards.
pub fn is_supported_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    )
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::PUT | Method::DELETE)
}

/// One request to forward, already matched and rewritten.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    /// Target path plus query string
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Pooled HTTP client shared by every route.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the TLS backend or resolver cannot be
    /// initialized.
    pub fn new() -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Send `request` to `instance` under `route`'s timeout and retry policy.
    pub async fn forward(
        &self,
        route: &RouteDefinition,
        instance: &ServiceInstance,
        request: OutboundRequest,
    ) -> Result<Response<Body>, GatewayError> {
        if !is_supported_method(&request.method) {
            return Err(GatewayError::UnsupportedMethod(request.method.to_string()));
        }

        let url = format!("{}{}", instance.base_url(), request.path_and_query);
        let attempts = if is_idempotent(&request.method) {
            route.retry_attempts.saturating_add(1)
        } else {
            1
        };

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            debug!(
                method = %request.method,
                url = %url,
                attempt,
                "Forwarding request"
            );
            let started = Instant::now();
            match self.send_once(route, &url, &request).await {
                Ok(response) => {
                    metrics::record_forwarded(
                        &route.service_name,
                        response.status().as_u16(),
                        started.elapsed().as_secs_f64(),
                    );
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        service = %route.service_name,
                        instance = %instance.id,
                        url = %url,
                        attempt,
                        attempts,
                        error = %e,
                        "Upstream call failed"
                    );
                    last_error = e;
                }
            }
        }

        Err(GatewayError::ForwardingFailed(last_error))
    }

    async fn send_once(
        &self,
        route: &RouteDefinition,
        url: &str,
        request: &OutboundRequest,
    ) -> Result<Response<Body>, String> {
        let mut builder = self.client.request(request.method.clone(), url);

        for (name, value) in &request.headers {
            if !skip_request_header(name) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if route.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(route.timeout_ms));
        }

        let upstream = builder.send().await.map_err(|e| describe(route, &e))?;
        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await.map_err(|e| describe(route, &e))?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        for (name, value) in &headers {
            if !skip_response_header(name) {
                response.headers_mut().append(name, value.clone());
            }
        }
        Ok(response)
    }
}

fn describe(route: &RouteDefinition, error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("upstream timed out after {}ms", route.timeout_ms)
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_methods() {
        assert!(is_supported_method(&Method::GET));
        assert!(is_supported_method(&Method::POST));
        assert!(is_supported_method(&Method::PUT));
        assert!(is_supported_method(&Method::DELETE));
        assert!(!is_supported_method(&Method::PATCH));
        assert!(!is_supported_method(&Method::HEAD));
        assert!(!is_supported_method(&Method::OPTIONS));
    }

    #[test]
    fn test_post_is_not_retried() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::PUT));
        assert!(is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::POST));
    }

    #[tokio::test]
    async fn test_unsupported_method_rejected_before_sending() {
        let forwarder = Forwarder::new().unwrap();
        let route = RouteDefinition::new("r", "/r/**", "svc");
        // Port 9 (discard) is never contacted
        let instance = ServiceInstance::new("svc-1", "svc", "127.0.0.1", 9);
        let request = OutboundRequest {
            method: Method::PATCH,
            path_and_query: "/x".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let err = forwarder.forward(&route, &instance, request).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedMethod(m) if m == "PATCH"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_forwarding_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let forwarder = Forwarder::new().unwrap();
        let route = RouteDefinition::new("r", "/r/**", "svc").with_retry_attempts(1);
        let instance = ServiceInstance::new("svc-1", "svc", "127.0.0.1", port);
        let request = OutboundRequest {
            method: Method::GET,
            path_and_query: "/x".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };

        let err = forwarder.forward(&route, &instance, request).await.unwrap_err();
        assert!(matches!(err, GatewayError::ForwardingFailed(_)));
    }
}
