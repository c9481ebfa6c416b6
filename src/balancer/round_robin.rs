use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::ServiceInstance;

/// Cycles through the instance list with a single monotonic counter.
///
/// The index is taken modulo the list length at call time, so the cycle
/// adapts when instances are added or removed.
#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_instance<'a>(
        &self,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % instances.len();
        instances.get(index)
    }
}
