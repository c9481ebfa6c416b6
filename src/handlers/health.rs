//! Health and status endpoints.
//!
//! # Endpoints
//!
//! - `GET /` - Plain-text banner
//! - `GET /health` - Liveness with route and service counts
//! - `GET /status` - Static service description
//!
//! `/health` sits under the default health prefix and bypasses rate
//! limiting. `/status` is gated like any other path.

use axum::Json;
use axum::extract::State;
use chrono::Utc;
use tracing::instrument;

use crate::models::{HealthResponse, StatusResponse};
use crate::state::AppState;

const FEATURES: [&str; 4] = [
    "request-routing",
    "load-balancing",
    "service-discovery",
    "rate-limiting",
];

const BANNER: &str = concat!(
    "API Gateway v",
    env!("CARGO_PKG_VERSION"),
    " - Request Routing & Load Balancing"
);

/// Index endpoint.
pub async fn index() -> &'static str {
    BANNER
}

/// Health check endpoint.
///
/// Always returns 200 OK while the process is serving.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-01-15T10:30:00Z",
///   "routes": 2,
///   "services": 2
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let services = state
        .registry
        .get_all_services()
        .values()
        .filter(|instances| !instances.is_empty())
        .count();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        routes: state.router.table().len(),
        services,
    })
}

/// Service description endpoint.
#[instrument(skip(state))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        features: FEATURES.iter().map(ToString::to_string).collect(),
        status: "running".to_string(),
        uptime_seconds: state.uptime_seconds(),
    })
}
