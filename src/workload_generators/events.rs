use serde::{Deserialize, Serialize};

/// Multi-dimensional resource amount used both for host capacities and for
/// container demands. All components are non-negative.
#[derive(Clone, Copy, Serialize, Deserialize, Default, Debug, PartialEq)]
pub struct ResourceVector {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
}

impl ResourceVector {
    pub fn new(cpu: f64, memory: f64, storage: f64) -> Self {
        Self { cpu, memory, storage }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu <= 0. && self.memory <= 0. && self.storage <= 0.
    }

    /// Component-wise `self <= other`.
    pub fn fit_into(&self, other: &ResourceVector) -> bool {
        self.cpu <= other.cpu && self.memory <= other.memory && self.storage <= other.storage
    }

    pub fn add(&mut self, other: &ResourceVector) {
        self.cpu += other.cpu;
        self.memory += other.memory;
        self.storage += other.storage;
    }

    pub fn subtract(&mut self, other: &ResourceVector) {
        self.cpu = (self.cpu - other.cpu).max(0.);
        self.memory = (self.memory - other.memory).max(0.);
        self.storage = (self.storage - other.storage).max(0.);
    }

    pub fn added(&self, other: &ResourceVector) -> ResourceVector {
        let mut result = *self;
        result.add(other);
        result
    }

    pub fn subtracted(&self, other: &ResourceVector) -> ResourceVector {
        let mut result = *self;
        result.subtract(other);
        result
    }

    /// Largest component-wise ratio of `self` to `total`: the dominant-share
    /// computation. A dimension with zero total capacity counts as saturated
    /// when anything is consumed on it, instead of dividing by zero.
    pub fn max_share_of(&self, total: &ResourceVector) -> f64 {
        share_of(self.cpu, total.cpu)
            .max(share_of(self.memory, total.memory))
            .max(share_of(self.storage, total.storage))
    }

    /// Mean of the per-dimension ratios of `self` to `capacity`.
    /// Zero-capacity dimensions are excluded.
    pub fn mean_share_of(&self, capacity: &ResourceVector) -> f64 {
        let mut sum = 0.;
        let mut dims = 0;
        for (used, total) in [
            (self.cpu, capacity.cpu),
            (self.memory, capacity.memory),
            (self.storage, capacity.storage),
        ] {
            if total > 0. {
                sum += used / total;
                dims += 1;
            }
        }
        if dims == 0 {
            0.
        } else {
            sum / dims as f64
        }
    }
}

fn share_of(consumed: f64, total: f64) -> f64 {
    if total > 0. {
        consumed / total
    } else if consumed > 0. {
        1.0
    } else {
        0.0
    }
}

/// A container placement request. Immutable once the queue watcher has
/// assigned its id; resolved exactly once (placed, rejected or flushed).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExecutionRequest {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub collection_id: Option<u64>,
    pub time: f64,
    pub demand: ResourceVector,
    /// How long the container holds its resources once placed. `None` means
    /// it keeps them until simulation teardown.
    pub duration: Option<f64>,
    pub priority: Option<u64>,
}

#[derive(Serialize, Clone)]
pub struct ExecutionRequestEvent {
    pub request: ExecutionRequest,
}

/// Announces a request class (tenant). DRF and FUSE account dominant shares
/// per collection user.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CollectionRequest {
    pub id: Option<u64>,
    pub time: f64,
    pub user: Option<String>,
    pub priority: Option<u64>,
}

#[derive(Serialize, Clone)]
pub struct CollectionRequestEvent {
    pub request: CollectionRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_and_arithmetic() {
        let mut a = ResourceVector::new(2., 4., 8.);
        let b = ResourceVector::new(1., 4., 8.);
        assert!(b.fit_into(&a));
        assert!(!a.fit_into(&b));
        a.subtract(&b);
        assert_eq!(a, ResourceVector::new(1., 0., 0.));
        a.add(&b);
        assert_eq!(a, ResourceVector::new(2., 4., 8.));
    }

    #[test]
    fn dominant_share_guards_zero_capacity() {
        let total = ResourceVector::new(10., 0., 100.);
        let consumed = ResourceVector::new(2., 1., 10.);
        // memory capacity is zero but consumed, so the share saturates
        assert_eq!(consumed.max_share_of(&total), 1.0);
        let idle = ResourceVector::new(2., 0., 10.);
        assert_eq!(idle.max_share_of(&total), 0.2);
    }

    #[test]
    fn mean_share_skips_empty_dimensions() {
        let capacity = ResourceVector::new(10., 20., 0.);
        let used = ResourceVector::new(5., 5., 0.);
        assert_eq!(used.mean_share_of(&capacity), (0.5 + 0.25) / 2.);
    }
}
