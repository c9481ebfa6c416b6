//! In-memory directory of backend instances per logical service name.
//!
//! # Concurrency
//!
//! Instances are stored in a sharded `DashMap<String, Vec<ServiceInstance>>`.
//! Each service name's list is guarded by its shard lock only, so a
//! registration for `catalog` never waits on a lookup for `discovery` unless
//! both names hash to the same shard. Lookups clone the healthy subset and
//! release the shard before returning.
//!
//! # Health
//!
//! The registry never probes instances. An external monitor reports liveness
//! through [`ServiceRegistry::set_health`] or by deregistering instances.

use std::collections::HashMap;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::models::ServiceInstance;

/// Directory of backend instances, keyed by logical service name.
pub trait ServiceRegistry: Send + Sync {
    /// Healthy instances of `service_name`; empty for unknown names.
    fn get_healthy_instances(&self, service_name: &str) -> Vec<ServiceInstance>;

    /// Snapshot of every service's healthy instances.
    fn get_all_services(&self) -> HashMap<String, Vec<ServiceInstance>>;

    /// Append `instance` to the list for `instance.name`. Duplicate ids are kept.
    fn register_instance(&self, instance: ServiceInstance);

    /// Remove every instance with this id from every service.
    fn deregister_instance(&self, instance_id: &str);

    /// Set the health flag of every instance with this id.
    ///
    /// Returns `true` if at least one instance matched.
    fn set_health(&self, instance_id: &str, healthy: bool) -> bool;
}

/// Default registry backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    services: DashMap<String, Vec<ServiceInstance>>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the development seed instances
    /// (`discovery` on `localhost:8081`, `catalog` on `localhost:8090`).
    pub fn with_default_instances() -> Self {
        let registry = Self::new();
        registry.register_instance(ServiceInstance::new(
            "discovery-1",
            "discovery",
            "localhost",
            8081,
        ));
        registry.register_instance(ServiceInstance::new(
            "catalog-1",
            "catalog",
            "localhost",
            8090,
        ));
        info!("Registered default service instances");
        registry
    }

    /// Total number of registered instances, healthy or not.
    pub fn instance_count(&self) -> usize {
        self.services.iter().map(|entry| entry.value().len()).sum()
    }
}

impl ServiceRegistry for InMemoryServiceRegistry {
    fn get_healthy_instances(&self, service_name: &str) -> Vec<ServiceInstance> {
        let healthy: Vec<ServiceInstance> = self
            .services
            .get(service_name)
            .map(|instances| instances.iter().filter(|i| i.healthy).cloned().collect())
            .unwrap_or_default();

        debug!(
            service = %service_name,
            count = healthy.len(),
            "Resolved healthy instances"
        );
        healthy
    }

    fn get_all_services(&self) -> HashMap<String, Vec<ServiceInstance>> {
        self.services
            .iter()
            .map(|entry| {
                let healthy = entry.value().iter().filter(|i| i.healthy).cloned().collect();
                (entry.key().clone(), healthy)
            })
            .collect()
    }

    fn register_instance(&self, instance: ServiceInstance) {
        info!(
            instance_id = %instance.id,
            service = %instance.name,
            base_url = %instance.base_url(),
            "Registered instance"
        );
        self.services
            .entry(instance.name.clone())
            .or_default()
            .push(instance);
    }

    fn deregister_instance(&self, instance_id: &str) {
        let mut removed = 0usize;
        for mut entry in self.services.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|i| i.id != instance_id);
            removed += before - entry.value().len();
        }
        info!(instance_id = %instance_id, removed, "Deregistered instance");
    }

    fn set_health(&self, instance_id: &str, healthy: bool) -> bool {
        let now = Utc::now();
        let mut matched = false;
        for mut entry in self.services.iter_mut() {
            for instance in entry.value_mut().iter_mut().filter(|i| i.id == instance_id) {
                instance.healthy = healthy;
                instance.last_health_check = now;
                matched = true;
            }
        }
        if matched {
            info!(instance_id = %instance_id, healthy, "Instance health updated");
        }
        matched
    }
}
