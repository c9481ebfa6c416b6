//! Load-balancing strategies and the registry that owns their state.
//!
//! # Strategies
//!
//! | Strategy | State | Selection |
//! |---|---|---|
//! | Round robin | one counter | `counter++ mod n` |
//! | Weighted round robin | current weight per instance id | smooth (nginx-style) |
//! | Random | none | uniform |
//! | Least connections | round robin | falls back to round robin |
//!
//! # State Ownership
//!
//! Stateful strategies only work if the same object sees every request for a
//! service. [`LoadBalancerRegistry`] keeps one [`LoadBalancer`] per
//! `(service name, strategy)` pair for the life of the process and hands out
//! shared references, so counters and weights survive across requests.
//! Each balancer synchronizes its own state; balancers for different
//! services never contend.

mod random;
mod round_robin;
mod weighted;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

pub use random::RandomBalancer;
pub use round_robin::RoundRobinBalancer;
pub use weighted::WeightedRoundRobinBalancer;

use crate::models::{LoadBalancingStrategy, ServiceInstance};

/// Closed set of selection algorithms.
#[derive(Debug)]
pub enum LoadBalancer {
    RoundRobin(RoundRobinBalancer),
    WeightedRoundRobin(WeightedRoundRobinBalancer),
    Random(RandomBalancer),
}

impl LoadBalancer {
    /// Fresh balancer state for `strategy`.
    pub fn for_strategy(strategy: LoadBalancingStrategy) -> Self {
        match strategy {
            LoadBalancingStrategy::RoundRobin => Self::RoundRobin(RoundRobinBalancer::new()),
            LoadBalancingStrategy::WeightedRoundRobin => {
                Self::WeightedRoundRobin(WeightedRoundRobinBalancer::new())
            }
            LoadBalancingStrategy::Random => Self::Random(RandomBalancer),
            LoadBalancingStrategy::LeastConnections => {
                warn!("LEAST_CONNECTIONS is not implemented, using round robin");
                Self::RoundRobin(RoundRobinBalancer::new())
            }
        }
    }

    /// Pick one instance. Returns `None` iff `instances` is empty.
    pub fn select_instance<'a>(
        &self,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        match self {
            Self::RoundRobin(balancer) => balancer.select_instance(instances),
            Self::WeightedRoundRobin(balancer) => balancer.select_instance(instances),
            Self::Random(balancer) => balancer.select_instance(instances),
        }
    }

    /// Algorithm name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundRobin(_) => "round_robin",
            Self::WeightedRoundRobin(_) => "weighted_round_robin",
            Self::Random(_) => "random",
        }
    }
}

/// Long-lived, shared balancer state keyed by `(service name, strategy)`.
#[derive(Debug, Default)]
pub struct LoadBalancerRegistry {
    balancers: DashMap<(String, LoadBalancingStrategy), Arc<LoadBalancer>>,
}

impl LoadBalancerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the balancer for this pair, creating it on first use.
    pub fn resolve(&self, service_name: &str, strategy: LoadBalancingStrategy) -> Arc<LoadBalancer> {
        self.balancers
            .entry((service_name.to_string(), strategy))
            .or_insert_with(|| {
                debug!(
                    service = %service_name,
                    strategy = strategy.as_str(),
                    "Creating load balancer"
                );
                Arc::new(LoadBalancer::for_strategy(strategy))
            })
            .clone()
    }

    /// Number of live balancers.
    pub fn len(&self) -> usize {
        self.balancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balancers.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn instances(service: &str, count: usize) -> Vec<ServiceInstance> {
        (0..count)
            .map(|i| ServiceInstance::new(format!("{service}-{i}"), service, "localhost", 9000))
            .collect()
    }

    #[test]
    fn test_resolve_returns_shared_state() {
        let registry = LoadBalancerRegistry::new();
        let a = registry.resolve("catalog", LoadBalancingStrategy::RoundRobin);
        let b = registry.resolve("catalog", LoadBalancingStrategy::RoundRobin);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_separates_services_and_strategies() {
        let registry = LoadBalancerRegistry::new();
        let a = registry.resolve("catalog", LoadBalancingStrategy::RoundRobin);
        let b = registry.resolve("discovery", LoadBalancingStrategy::RoundRobin);
        let c = registry.resolve("catalog", LoadBalancingStrategy::Random);
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_round_robin_survives_across_resolves() {
        let registry = LoadBalancerRegistry::new();
        let list = instances("catalog", 3);

        let picks: Vec<String> = (0..6)
            .map(|_| {
                registry
                    .resolve("catalog", LoadBalancingStrategy::RoundRobin)
                    .select_instance(&list)
                    .map(|i| i.id.clone())
                    .unwrap()
            })
            .collect();

        assert_eq!(
            picks,
            vec![
                "catalog-0",
                "catalog-1",
                "catalog-2",
                "catalog-0",
                "catalog-1",
                "catalog-2"
            ]
        );
    }

    #[test]
    fn test_least_connections_behaves_like_round_robin() {
        let balancer = LoadBalancer::for_strategy(LoadBalancingStrategy::LeastConnections);
        assert_eq!(balancer.name(), "round_robin");

        let list = instances("svc", 2);
        assert_eq!(balancer.select_instance(&list).unwrap().id, "svc-0");
        assert_eq!(balancer.select_instance(&list).unwrap().id, "svc-1");
    }

    #[test]
    fn test_every_strategy_returns_none_for_empty_list() {
        for strategy in [
            LoadBalancingStrategy::RoundRobin,
            LoadBalancingStrategy::WeightedRoundRobin,
            LoadBalancingStrategy::LeastConnections,
            LoadBalancingStrategy::Random,
        ] {
            let balancer = LoadBalancer::for_strategy(strategy);
            assert!(balancer.select_instance(&[]).is_none(), "{strategy:?}");
        }
    }
}
