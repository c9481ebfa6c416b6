//! Domain models shared by the registry, balancers, rate limiter and router.

pub mod api;
pub mod instance;
pub mod rate_limit;
pub mod route;

pub use api::{
    BucketStatusResponse, ErrorResponse, HealthResponse, HealthUpdateRequest,
    RateLimitSummaryResponse, RateLimitedResponse, RouteSummary, RoutesResponse,
    ServicesResponse, StatusResponse,
};
pub use instance::ServiceInstance;
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStrategy};
pub use route::{LoadBalancingStrategy, RouteDefinition};
