//! Rate-limit gate: per-client token buckets in front of every route.
//!
//! # Decision Order
//!
//! 1. Paths under the health or metrics prefix bypass the gate, as do
//!    paths under the debug prefix when `skip-debug-endpoints` is set.
//! 2. With rate limiting disabled every request bypasses the gate.
//! 3. The client is identified (see [`super::client_id`]).
//! 4. The effective limit is the client's entry in `user-limits`, else the
//!    first `path-limits` pattern matching the whole path (patterns are
//!    tried in key order), else `default-limit`.
//! 5. One token is taken from the client's bucket.
//!
//! # Response Headers
//!
//! On every gated response:
//! - `X-RateLimit-Limit`: requests per minute of the effective limit
//! - `X-RateLimit-Remaining`: tokens left after this request
//! - `X-RateLimit-Reset`: epoch milliseconds, last refill + 60s
//!
//! On 429 additionally:
//! - `Retry-After`: whole seconds until one more token accrues

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use regex::Regex;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::client_id::identify_client;
use crate::config::{RateLimitSettings, anchored_regex};
use crate::error::{AppError, AppResult};
use crate::models::{RateLimitConfig, RateLimitResult, RateLimitedResponse};
use crate::ratelimit::RateLimiter;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Outcome of one token taken by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub limit: RateLimitConfig,
    pub result: RateLimitResult,
}

/// Request-level rate limiting policy.
pub struct RateLimitGate {
    settings: RateLimitSettings,
    path_limits: Vec<(Regex, RateLimitConfig)>,
    limiter: Arc<dyn RateLimiter>,
}

impl RateLimitGate {
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a path-limit pattern does not
    /// compile.
    pub fn new(settings: &RateLimitSettings, limiter: Arc<dyn RateLimiter>) -> AppResult<Self> {
        let path_limits = settings
            .path_limits
            .iter()
            .map(|(pattern, limit)| {
                anchored_regex(pattern)
                    .map(|re| (re, *limit))
                    .map_err(|e| {
                        AppError::ConfigError(format!(
                            "Invalid path-limits pattern {pattern:?}: {e}"
                        ))
                    })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self {
            settings: settings.clone(),
            path_limits,
            limiter,
        })
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    /// Whether `path` is exempt from limiting regardless of configuration.
    pub fn should_skip(&self, path: &str) -> bool {
        let s = &self.settings;
        path.starts_with(s.health_path_prefix.as_str())
            || path.starts_with(s.metrics_path_prefix.as_str())
            || (s.skip_debug_endpoints && path.starts_with(s.debug_path_prefix.as_str()))
    }

    /// Effective limit for this client on this path.
    pub fn resolve_limit(&self, client_id: &str, path: &str) -> RateLimitConfig {
        if let Some(limit) = self.settings.user_limits.get(client_id) {
            return *limit;
        }
        self.path_limits
            .iter()
            .find(|(re, _)| re.is_match(path))
            .map(|(_, limit)| *limit)
            .unwrap_or(self.settings.default_limit)
    }

    /// Take a token for `req`. `None` means the request bypasses the gate.
    pub fn check<B>(&self, req: &Request<B>) -> Option<GateOutcome> {
        let path = req.uri().path();
        if self.should_skip(path) || !self.settings.enabled {
            return None;
        }

        let client = identify_client(req);
        let limit = self.resolve_limit(&client.id, path);
        let result = self.limiter.check_limit(&client.id, &limit);

        if result.allowed {
            debug!(
                client_id = %client.id,
                source = client.source.as_str(),
                path = %path,
                remaining = result.remaining,
                "Rate limit check passed"
            );
        } else {
            warn!(
                client_id = %client.id,
                source = client.source.as_str(),
                path = %path,
                limit = limit.requests_per_minute,
                retry_after_secs = result.retry_after_seconds,
                "Rate limit exceeded"
            );
        }

        Some(GateOutcome { limit, result })
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, outcome: &GateOutcome) {
    headers.insert(
        RATE_LIMIT_LIMIT_HEADER,
        HeaderValue::from(outcome.limit.requests_per_minute),
    );
    headers.insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(outcome.result.remaining),
    );
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(outcome.result.reset_time),
    );
}

/// 429 response for a denied request.
pub fn rate_limited_response(outcome: &GateOutcome) -> Response<Body> {
    let body = RateLimitedResponse::new(
        outcome.limit.requests_per_minute,
        outcome.result.retry_after_seconds,
        outcome.result.reset_time,
    );
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

    let headers = response.headers_mut();
    insert_rate_limit_headers(headers, outcome);
    headers.insert(
        RETRY_AFTER_HEADER,
        HeaderValue::from(outcome.result.retry_after_seconds),
    );
    response
}

/// Rate limiting layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let gate = RateLimitGate::new(&settings, Arc::new(TokenBucketLimiter::new()))?;
/// let app = Router::new()
///     .fallback(proxy)
///     .layer(RateLimitLayer::new(Arc::new(gate)));
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    gate: Arc<RateLimitGate>,
}

impl RateLimitLayer {
    pub fn new(gate: Arc<RateLimitGate>) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    gate: Arc<RateLimitGate>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let outcome = self.gate.check(&req);

        Box::pin(async move {
            match outcome {
                None => inner.call(req).await,
                Some(outcome) if outcome.result.allowed => {
                    let mut response = inner.call(req).await?;
                    insert_rate_limit_headers(response.headers_mut(), &outcome);
                    Ok(response)
                }
                Some(outcome) => Ok(rate_limited_response(&outcome)),
            }
        })
    }
}
