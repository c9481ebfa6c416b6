//! # API Gateway
//!
//! An HTTP API gateway built on Axum that fronts a set of backend services:
//!
//! - **Routing**: exact, wildcard (`/**`) and template (`/{id}`) routes
//! - **Load Balancing**: round robin, weighted round robin and random
//! - **Rate Limiting**: per-client token buckets with `X-RateLimit-*` headers
//! - **Observability**: request ids, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Rate Limit → Request ID → Trace → Body Limit)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, status, debug, proxy fallback)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  GatewayRouter (RouteTable → LoadBalancer → Forwarder)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServiceRegistry / RateLimiter (in-memory, concurrent)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Backend services (HTTP)                                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use api_gateway::{AppState, Config, GatewayConfig, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let gateway = GatewayConfig::load(&config)?;
//!
//!     let state = AppState::new(config, gateway)?;
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Point the gateway at a routes file and enable rate limiting:
//! ```bash
//! GATEWAY_CONFIG=gateway.toml RATE_LIMIT_ENABLED=true cargo run
//! ```

pub mod balancer;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod ratelimit;
pub mod registry;
pub mod router;
pub mod routes;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, GatewayConfig};
pub use error::{AppError, AppResult, GatewayError};
pub use routes::build_router;
pub use state::AppState;
