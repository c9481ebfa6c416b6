//! Backend service instance.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One concrete, addressable backend process serving a logical service.
///
/// Instances are owned by the service registry. `healthy` is never probed by
/// the gateway itself; it is set on registration and changed only through
/// the registry's health mutation.
///
/// # JSON Shape
///
/// ```json
/// {
///   "id": "catalog-1",
///   "name": "catalog",
///   "host": "localhost",
///   "port": 8090,
///   "scheme": "http",
///   "weight": 1,
///   "healthy": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: String,
    /// Logical service name this instance belongs to
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Static weight used by weighted round robin (>= 1)
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_healthy")]
    pub healthy: bool,
    #[serde(default = "Utc::now")]
    pub last_health_check: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_weight() -> u32 {
    1
}

fn default_healthy() -> bool {
    true
}

impl ServiceInstance {
    /// Create a healthy `http` instance with weight 1.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            host: host.into(),
            port,
            scheme: default_scheme(),
            weight: default_weight(),
            healthy: true,
            last_health_check: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Set the static weight. Values below 1 are raised to 1.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_healthy(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `scheme://host:port`, the prefix every forwarded URL is built on.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Weight as used by the balancers; a deserialized 0 counts as 1.
    pub fn effective_weight(&self) -> i64 {
        i64::from(self.weight.max(1))
    }
}
