use parking_lot::Mutex;

use crate::models::ServiceInstance;

/// Smooth weighted round robin.
///
/// Every call adds each instance's static weight to its current weight,
/// picks the highest current weight (first one wins ties), then subtracts
/// the total static weight from the winner. Over `Σweight` calls each
/// instance is picked exactly `weight` times, interleaved rather than in
/// runs.
///
/// Current weights are held per list position, so instances sharing an id
/// still get their own share. State resets whenever the ids in the list
/// change, in content or order.
#[derive(Debug, Default)]
pub struct WeightedRoundRobinBalancer {
    current_weights: Mutex<Vec<(String, i64)>>,
}

impl WeightedRoundRobinBalancer {
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

        let total_weight: i64 = instances.iter().map(ServiceInstance::effective_weight).sum();

        let mut weights = self.current_weights.lock();
        let same_shape = weights.len() == instances.len()
            && weights
                .iter()
                .zip(instances)
                .all(|((id, _), instance)| *id == instance.id);
        if !same_shape {
            *weights = instances.iter().map(|i| (i.id.clone(), 0)).collect();
        }

        let mut best: Option<(usize, i64)> = None;
        for (index, ((_, current), instance)) in weights.iter_mut().zip(instances).enumerate() {
            *current += instance.effective_weight();
            if best.is_none_or(|(_, max)| *current > max) {
                best = Some((index, *current));
            }
        }

        let (index, _) = best?;
        if let Some((_, current)) = weights.get_mut(index) {
            *current -= total_weight;
        }
        instances.get(index)
    }
}
