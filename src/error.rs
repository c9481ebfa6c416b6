use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::metrics;
use crate::models::ErrorResponse;

/// Process-level errors: configuration, startup and admin endpoint failures.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Gateway configuration error. Please contact support.",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

/// Per-request routing failures.
///
/// Every variant is terminal for its request: nothing is retried here and
/// no state is shared with other requests to the same backend. Bodies are
/// plain text.
///
/// | Variant | Status |
/// |---|---|
/// | `RouteNotFound` | 404 |
/// | `ServiceUnavailable` | 500 |
/// | `LoadBalancingFailed` | 500 |
/// | `UnsupportedMethod` | 400 |
/// | `ForwardingFailed` | 500 |
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Load balancing failed")]
    LoadBalancingFailed,

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Request forwarding failed: {0}")]
    ForwardingFailed(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::UnsupportedMethod(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServiceUnavailable(_)
            | GatewayError::LoadBalancingFailed
            | GatewayError::ForwardingFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label for this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound(_) => "route_not_found",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
            GatewayError::LoadBalancingFailed => "load_balancing_failed",
            GatewayError::UnsupportedMethod(_) => "unsupported_method",
            GatewayError::ForwardingFailed(_) => "forwarding_failed",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Routing failed");
        } else {
            tracing::warn!(kind = self.kind(), error = %self, "Routing rejected");
        }
        metrics::record_routing_failure(self.kind());

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_gateway_error_bodies_are_plain_text() {
        let response = GatewayError::RouteNotFound("/nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Route not found: /nope");

        let response = GatewayError::ServiceUnavailable("catalog".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Service unavailable: catalog");

        let response = GatewayError::LoadBalancingFailed.into_response();
        assert_eq!(body_text(response).await, "Load balancing failed");

        let response = GatewayError::UnsupportedMethod("PATCH".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Unsupported method: PATCH");
    }

    #[tokio::test]
    async fn test_forwarding_failure_includes_detail() {
        let response =
            GatewayError::ForwardingFailed("connection refused".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_app_error_hides_internal_detail() {
        let response = AppError::Internal("db password wrong".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(response).await;
        assert!(body.contains("internal_error"));
        assert!(!body.contains("password"));
    }

    #[tokio::test]
    async fn test_app_error_not_found_shows_message() {
        let response = AppError::NotFound("No bucket for client c1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("No bucket for client c1"));
    }
}
