//! Shared application state for Axum handlers.
//!
//! Every component is behind an `Arc` and synchronizes itself, so the state
//! is cloned per request without copying any registry, bucket or balancer
//! data.
//!
//! # Components
//!
//! - **Registry**: backend instances per service ([`ServiceRegistry`])
//! - **Limiter**: per-client token buckets ([`RateLimiter`])
//! - **Gate**: rate-limit policy in front of every request
//! - **Router**: route table, balancer state and outbound client

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::config::{Config, GatewayConfig};
use crate::error::AppResult;
use crate::middleware::RateLimitGate;
use crate::ratelimit::{RateLimiter, TokenBucketLimiter};
use crate::registry::{InMemoryServiceRegistry, ServiceRegistry};
use crate::router::GatewayRouter;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Process settings
    pub config: Arc<Config>,
    /// Routes and rate limiting settings
    pub gateway: Arc<GatewayConfig>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub limiter: Arc<dyn RateLimiter>,
    pub gate: Arc<RateLimitGate>,
    pub router: Arc<GatewayRouter>,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Build state with the in-memory registry and token bucket limiter.
    ///
    /// The registry is seeded with the development instances when
    /// `config.seed_default_instances` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a path-limit pattern is invalid or the outbound
    /// HTTP client cannot be created.
    pub fn new(config: Config, gateway: GatewayConfig) -> AppResult<Self> {
        let registry = if config.seed_default_instances {
            InMemoryServiceRegistry::with_default_instances()
        } else {
            InMemoryServiceRegistry::new()
        };
        Self::with_components(
            config,
            gateway,
            Arc::new(registry),
            Arc::new(TokenBucketLimiter::new()),
        )
    }

    /// Build state around caller-provided registry and limiter.
    ///
    /// # Errors
    ///
    /// See [`AppState::new`].
    pub fn with_components(
        config: Config,
        gateway: GatewayConfig,
        registry: Arc<dyn ServiceRegistry>,
        limiter: Arc<dyn RateLimiter>,
    ) -> AppResult<Self> {
        let gate = RateLimitGate::new(&gateway.rate_limiting, limiter.clone())?;
        let router = GatewayRouter::new(
            &gateway.routes,
            registry.clone(),
            config.max_request_body_size,
        )?;

        info!(
            routes = gateway.routes.len(),
            rate_limiting = gateway.rate_limiting.enabled,
            storage = %gateway.rate_limiting.storage.describe(),
            "Gateway state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            registry,
            limiter,
            gate: Arc::new(gate),
            router: Arc::new(router),
            started_at: Instant::now(),
        })
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
