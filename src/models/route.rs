//! Route definitions loaded from the gateway file.

use serde::{Deserialize, Serialize};

/// Load-balancing algorithm a route asks for.
///
/// `LeastConnections` has no distinct implementation: the balancer registry
/// serves it with round robin state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalancingStrategy {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    Random,
}

impl LoadBalancingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "ROUND_ROBIN",
            Self::WeightedRoundRobin => "WEIGHTED_ROUND_ROBIN",
            Self::LeastConnections => "LEAST_CONNECTIONS",
            Self::Random => "RANDOM",
        }
    }
}

/// A configured mapping from a request path pattern to a logical service.
///
/// `path` is one of:
/// - an exact path (`/status`)
/// - a prefix pattern ending in `/**` (`/gateway/catalog/**`)
/// - a template with `{var}` segments (`/gateway/users/{id}/orders`)
///
/// Routes are immutable once the router is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteDefinition {
    pub id: String,
    pub path: String,
    pub service_name: String,
    #[serde(default = "default_strip_prefix")]
    pub strip_prefix: bool,
    /// Extra attempts after a transport failure (idempotent methods only)
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Per-attempt deadline for the upstream call; 0 disables it
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub load_balancing_strategy: LoadBalancingStrategy,
}

fn default_strip_prefix() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl RouteDefinition {
    /// Create a route with the default policy (strip prefix, 3 retries,
    /// 30s timeout, round robin).
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            service_name: service_name.into(),
            strip_prefix: default_strip_prefix(),
            retry_attempts: default_retry_attempts(),
            timeout_ms: default_timeout_ms(),
            load_balancing_strategy: LoadBalancingStrategy::default(),
        }
    }

    pub fn with_strip_prefix(mut self, strip_prefix: bool) -> Self {
        self.strip_prefix = strip_prefix;
        self
    }

    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = retry_attempts;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_strategy(mut self, strategy: LoadBalancingStrategy) -> Self {
        self.load_balancing_strategy = strategy;
        self
    }

    /// Prefix of a `/**` route, or `None` for exact and template routes.
    pub fn wildcard_prefix(&self) -> Option<&str> {
        self.path.strip_suffix("/**")
    }

    /// Whether the path declares `{var}` segments.
    pub fn is_template(&self) -> bool {
        self.path.contains('{')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_route_defaults_from_toml() {
        let route: RouteDefinition = toml::from_str(
            r#"
            id = "catalog"
            path = "/gateway/catalog/**"
            service-name = "catalog"
            "#,
        )
        .unwrap();

        assert!(route.strip_prefix);
        assert_eq!(route.retry_attempts, 3);
        assert_eq!(route.timeout_ms, 30_000);
        assert_eq!(
            route.load_balancing_strategy,
            LoadBalancingStrategy::RoundRobin
        );
    }

    #[test]
    fn test_strategy_names() {
        let route: RouteDefinition = toml::from_str(
            r#"
            id = "w"
            path = "/w/**"
            service-name = "w"
            load-balancing-strategy = "WEIGHTED_ROUND_ROBIN"
            "#,
        )
        .unwrap();

        assert_eq!(
            route.load_balancing_strategy,
            LoadBalancingStrategy::WeightedRoundRobin
        );
        assert_eq!(route.load_balancing_strategy.as_str(), "WEIGHTED_ROUND_ROBIN");
    }

    #[test]
    fn test_wildcard_prefix() {
        let route = RouteDefinition::new("a", "/gateway/api/**", "api");
        assert_eq!(route.wildcard_prefix(), Some("/gateway/api"));

        let exact = RouteDefinition::new("b", "/status", "status");
        assert_eq!(exact.wildcard_prefix(), None);
        assert!(!exact.is_template());

        let template = RouteDefinition::new("c", "/users/{id}", "users");
        assert!(template.is_template());
    }
}
