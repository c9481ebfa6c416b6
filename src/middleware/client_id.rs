//! Client identification for rate limiting.
//!
//! # Priority
//!
//! The first source that yields a non-empty value wins:
//!
//! 1. `X-User-ID` header
//! 2. `X-API-Key` header
//! 3. `X-Forwarded-For` header (first entry of the comma-separated list)
//! 4. `X-Real-IP` header
//! 5. Socket peer address (`ConnectInfo<SocketAddr>`)
//! 6. [`UNKNOWN_CLIENT`]
//!
//! # Security Warning
//!
//! **Every header source is client-provided.** A caller can pick its own
//! bucket by sending `X-User-ID`, or rotate `X-Forwarded-For` values to
//! dodge per-IP limits. Run the gateway behind a proxy that strips or
//! overwrites these headers, or behind an authenticating layer that sets
//! `X-User-ID` itself.
//!
//! All requests without any identity share the `"unknown"` bucket.

use std::borrow::Cow;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Shared key for requests with no identifiable source.
pub const UNKNOWN_CLIENT: &str = "unknown";

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Where a client identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientSource {
    UserId,
    ApiKey,
    ForwardedFor,
    RealIp,
    RemoteAddr,
    Unknown,
}

impl ClientSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::ApiKey => "api_key",
            Self::ForwardedFor => "x_forwarded_for",
            Self::RealIp => "x_real_ip",
            Self::RemoteAddr => "remote_addr",
            Self::Unknown => "unknown",
        }
    }
}

/// Resolved rate-limit key for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Borrowed for the "unknown" fallback, owned otherwise
    pub id: Cow<'static, str>,
    pub source: ClientSource,
}

/// Trimmed, non-empty header value.
#[inline]
fn header_value<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identify the client behind `req`. See the module docs for the order.
pub fn identify_client<B>(req: &Request<B>) -> ClientIdentity {
    let found = |value: &str, source| ClientIdentity {
        id: Cow::Owned(value.to_string()),
        source,
    };

    if let Some(user) = header_value(req, USER_ID_HEADER) {
        return found(user, ClientSource::UserId);
    }
    if let Some(key) = header_value(req, API_KEY_HEADER) {
        return found(key, ClientSource::ApiKey);
    }
    // Format: "client, proxy1, proxy2"; the first entry is the client
    if let Some(first) = header_value(req, FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return found(first, ClientSource::ForwardedFor);
    }
    if let Some(real_ip) = header_value(req, REAL_IP_HEADER) {
        return found(real_ip, ClientSource::RealIp);
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return ClientIdentity {
            id: Cow::Owned(addr.ip().to_string()),
            source: ClientSource::RemoteAddr,
        };
    }

    ClientIdentity {
        id: Cow::Borrowed(UNKNOWN_CLIENT),
        source: ClientSource::Unknown,
    }
}
