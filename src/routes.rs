//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │ Rate-Limit Gate  │ ← 429 if the client's bucket is empty
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets X-Request-Id if absent, echoes it back
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 if Content-Length exceeds the limit
//! └────────┬─────────┘
//!          │
//!          ▼
//!   Handler / Gateway router (fallback)
//! ```
//!
//! # Route Groups
//!
//! - `/` - Banner
//! - `/health`, `/status` - Health & status
//! - `/debug/...` - Introspection and admin (when `DEBUG_ENDPOINTS` is true)
//! - everything else - routed to backend services

use axum::Router;
use axum::routing::{get, put};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::handlers::debug;
use crate::middleware::RateLimitLayer;
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// The rate-limit gate is always installed; it bypasses every request when
/// rate limiting is disabled in the gateway configuration.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::status));

    if config.debug_endpoints {
        info!("Debug endpoints enabled under /debug");
        router = router.merge(debug_routes());
    } else {
        info!("Debug endpoints disabled (DEBUG_ENDPOINTS=false)");
    }

    // Everything else goes to the gateway router
    router = router.fallback(handlers::proxy);

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Request body size limit
    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );
    router = router.layer(RequestBodyLimitLayer::new(config.max_request_body_size));

    // 2. Tracing
    router = router.layer(TraceLayer::new_for_http());

    // 3. Request ID (propagate inside, set outside so the trace span sees it)
    router = router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    // 4. Rate limiting - applied last, runs first in request pipeline
    let settings = state.gate.settings();
    if settings.enabled {
        info!(
            default_rpm = settings.default_limit.requests_per_minute,
            default_burst = settings.default_limit.burst_size,
            user_limits = settings.user_limits.len(),
            path_limits = settings.path_limits.len(),
            "Rate limiting enabled"
        );
    } else {
        info!("Rate limiting disabled");
    }
    router = router.layer(RateLimitLayer::new(state.gate.clone()));

    router.with_state(state)
}

fn debug_routes() -> Router<AppState> {
    Router::new()
        .route("/debug/routes", get(debug::list_routes))
        .route(
            "/debug/services",
            get(debug::list_services).post(debug::register_service),
        )
        .route(
            "/debug/services/{id}",
            axum::routing::delete(debug::deregister_service),
        )
        .route("/debug/services/{id}/health", put(debug::set_service_health))
        .route("/debug/ratelimit", get(debug::ratelimit_summary))
        .route(
            "/debug/ratelimit/{client_id}",
            get(debug::bucket_status).delete(debug::reset_bucket),
        )
}
