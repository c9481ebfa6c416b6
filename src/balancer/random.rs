use rand::Rng;

use crate::models::ServiceInstance;

/// Uniform random pick using the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBalancer;

impl RandomBalancer {
    pub fn select_instance<'a>(
        &self,
        instances: &'a [ServiceInstance],
    ) -> Option<&'a ServiceInstance> {
        if instances.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..instances.len());
        instances.get(index)
    }
}
