//! Fallback handler: every path without an explicit endpoint is routed.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;

use crate::state::AppState;

pub async fn proxy(State(state): State<AppState>, request: Request<Body>) -> Response {
    state.router.route(request).await
}
