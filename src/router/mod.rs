//! Request routing: match a path, pick a healthy instance, forward.
//!
//! # Request Lifecycle
//!
//! ```text
//! Unmatched ──find──▶ Matched ──registry──▶ BackendFound ──balancer──▶ InstanceSelected ──▶ Forwarded
//!     │                  │                        │                          │
//!     ▼                  ▼                        ▼                          ▼
//!    404                500                      500                     400 / 500
//! (RouteNotFound) (ServiceUnavailable) (LoadBalancingFailed) (UnsupportedMethod / ForwardingFailed)
//! ```
//!
//! Every request resolves its route, instances and balancer from scratch;
//! nothing about one request's failure is remembered for the next.

mod forwarder;
mod matcher;

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tracing::{debug, info};

pub use forwarder::{Forwarder, OutboundRequest, is_supported_method};
pub use matcher::{PathTemplate, RouteMatch, RouteTable};

use crate::balancer::LoadBalancerRegistry;
use crate::error::{AppResult, GatewayError};
use crate::models::RouteDefinition;
use crate::registry::ServiceRegistry;

/// Routes requests to backend instances.
pub struct GatewayRouter {
    table: RouteTable,
    registry: Arc<dyn ServiceRegistry>,
    balancers: LoadBalancerRegistry,
    forwarder: Forwarder,
    max_body_size: usize,
}

impl GatewayRouter {
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn new(
        routes: &[RouteDefinition],
        registry: Arc<dyn ServiceRegistry>,
        max_body_size: usize,
    ) -> AppResult<Self> {
        let table = RouteTable::new(routes);
        info!(routes = table.len(), "Initialized gateway router");
        Ok(Self {
            table,
            registry,
            balancers: LoadBalancerRegistry::new(),
            forwarder: Forwarder::new()?,
            max_body_size,
        })
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn balancers(&self) -> &LoadBalancerRegistry {
        &self.balancers
    }

    /// Route one request. Failures become their error response.
    pub async fn route(&self, request: Request<Body>) -> Response {
        match self.try_route(request).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn try_route(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        let path = request.uri().path().to_string();

        let matched = self
            .table
            .find(&path)
            .ok_or_else(|| GatewayError::RouteNotFound(path.clone()))?;
        let route = matched.route.clone();

        let instances = self.registry.get_healthy_instances(&route.service_name);
        if instances.is_empty() {
            return Err(GatewayError::ServiceUnavailable(route.service_name.clone()));
        }

        let balancer = self
            .balancers
            .resolve(&route.service_name, route.load_balancing_strategy);
        let instance = balancer
            .select_instance(&instances)
            .ok_or(GatewayError::LoadBalancingFailed)?;

        let method = request.method().clone();
        if !is_supported_method(&method) {
            return Err(GatewayError::UnsupportedMethod(method.to_string()));
        }

        let mut path_and_query = matched.target_path(&path);
        if let Some(query) = request.uri().query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        info!(
            method = %method,
            path = %path,
            route = %route.id,
            service = %route.service_name,
            instance = %instance.id,
            balancer = balancer.name(),
            target = %path_and_query,
            "Routing request"
        );
        if !matched.params.is_empty() {
            debug!(route = %route.id, params = ?matched.params, "Captured path variables");
        }

        let (parts, body) = request.into_parts();
        let body = to_bytes(body, self.max_body_size)
            .await
            .map_err(|e| GatewayError::ForwardingFailed(format!("Failed to read request body: {e}")))?;

        self.forwarder
            .forward(
                &route,
                instance,
                OutboundRequest {
                    method,
                    path_and_query,
                    headers: parts.headers,
                    body,
                },
            )
            .await
    }
}
