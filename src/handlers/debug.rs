//! Introspection and admin endpoints under `/debug`.
//!
//! # Endpoints
//!
//! | Method | Path | Purpose |
//! |---|---|---|
//! | GET | `/debug/routes` | Configured routes |
//! | GET | `/debug/services` | Healthy instances per service |
//! | POST | `/debug/services` | Register an instance |
//! | DELETE | `/debug/services/{id}` | Deregister an instance |
//! | PUT | `/debug/services/{id}/health` | Set an instance's health flag |
//! | GET | `/debug/ratelimit` | Rate limit settings and live buckets |
//! | GET | `/debug/ratelimit/{client_id}` | One client's bucket |
//! | DELETE | `/debug/ratelimit/{client_id}` | Reset one client's bucket |
//!
//! Mounted only when `DEBUG_ENDPOINTS` is true. These endpoints mutate
//! routing state and expose client identifiers; keep them off public
//! listeners.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::models::{
    BucketStatusResponse, HealthUpdateRequest, RateLimitSummaryResponse, RouteSummary,
    RoutesResponse, ServiceInstance, ServicesResponse,
};
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn list_routes(State(state): State<AppState>) -> Json<RoutesResponse> {
    let configured_routes: Vec<RouteSummary> = state
        .router
        .table()
        .routes()
        .iter()
        .map(|route| RouteSummary::from(route.as_ref()))
        .collect();

    Json(RoutesResponse {
        total_routes: configured_routes.len(),
        configured_routes,
    })
}

#[instrument(skip(state))]
pub async fn list_services(State(state): State<AppState>) -> Json<ServicesResponse> {
    let registered_services: BTreeMap<String, Vec<ServiceInstance>> =
        state.registry.get_all_services().into_iter().collect();
    let total_instances = registered_services.values().map(Vec::len).sum();

    Json(ServicesResponse {
        total_services: registered_services.len(),
        total_instances,
        registered_services,
    })
}

/// Register an instance from its JSON form.
///
/// # Request Body
///
/// ```json
/// { "id": "catalog-2", "name": "catalog", "host": "10.0.0.5", "port": 8090, "weight": 3 }
/// ```
#[instrument(skip_all, fields(instance_id = %instance.id, service = %instance.name))]
pub async fn register_service(
    State(state): State<AppState>,
    Json(instance): Json<ServiceInstance>,
) -> AppResult<(StatusCode, Json<ServiceInstance>)> {
    if instance.id.trim().is_empty() {
        return Err(AppError::BadRequest("Instance id cannot be empty".to_string()));
    }
    if instance.name.trim().is_empty() {
        return Err(AppError::BadRequest("Service name cannot be empty".to_string()));
    }
    if instance.host.trim().is_empty() {
        return Err(AppError::BadRequest("Host cannot be empty".to_string()));
    }
    if instance.port == 0 {
        return Err(AppError::BadRequest("Port must be greater than 0".to_string()));
    }
    if instance.weight == 0 {
        return Err(AppError::BadRequest("Weight must be at least 1".to_string()));
    }

    state.registry.register_instance(instance.clone());
    Ok((StatusCode::CREATED, Json(instance)))
}

#[instrument(skip(state))]
pub async fn deregister_service(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> StatusCode {
    state.registry.deregister_instance(&instance_id);
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
pub async fn set_service_health(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Json(update): Json<HealthUpdateRequest>,
) -> AppResult<Json<HealthUpdateRequest>> {
    if !state.registry.set_health(&instance_id, update.healthy) {
        return Err(AppError::NotFound(format!("Instance {instance_id} not found")));
    }
    Ok(Json(update))
}

#[instrument(skip(state))]
pub async fn ratelimit_summary(State(state): State<AppState>) -> Json<RateLimitSummaryResponse> {
    let settings = state.gate.settings();
    let mut buckets: Vec<BucketStatusResponse> = state
        .limiter
        .all_bucket_status()
        .into_iter()
        .map(|(client_id, status)| BucketStatusResponse::new(client_id, status))
        .collect();
    buckets.sort_by(|a, b| a.client_id.cmp(&b.client_id));

    Json(RateLimitSummaryResponse {
        enabled: settings.enabled,
        skip_debug_endpoints: settings.skip_debug_endpoints,
        default_limit: settings.default_limit,
        global_limit: settings.global_limit,
        user_limits: settings
            .user_limits
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect(),
        path_limits: settings.path_limits.clone(),
        storage: settings.storage.describe(),
        active_buckets: state.limiter.active_buckets(),
        buckets,
    })
}

#[instrument(skip(state))]
pub async fn bucket_status(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> AppResult<Json<BucketStatusResponse>> {
    let status = state
        .limiter
        .bucket_status(&client_id)
        .ok_or_else(|| AppError::NotFound(format!("No bucket for client {client_id}")))?;
    Ok(Json(BucketStatusResponse::new(client_id, status)))
}

#[instrument(skip(state))]
pub async fn reset_bucket(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> StatusCode {
    state.limiter.reset_limit(&client_id);
    info!(client_id = %client_id, "Rate limit reset via debug endpoint");
    StatusCode::NO_CONTENT
}
