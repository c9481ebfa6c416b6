//! HTTP middleware for rate limiting.
//!
//! - **Client identification**: header and socket based rate-limit keys
//! - **Rate-limit gate**: token bucket check with `X-RateLimit-*` headers
//!
//! Request ids, tracing and body limits come from `tower-http` layers
//! assembled in [`crate::routes`].
//!
//! # Architecture
//!
//! ```text
//! Request → Rate-Limit Gate → Request ID → Trace → Body Limit → Handler
//!               ↓
//!          429 Too Many Requests
//! ```

pub mod client_id;
pub mod rate_limit;

pub use client_id::{ClientIdentity, ClientSource, UNKNOWN_CLIENT, identify_client};
pub use rate_limit::{GateOutcome, RateLimitGate, RateLimitLayer, rate_limited_response};
