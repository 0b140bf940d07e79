use dslab_core::Id;
use serde::{Deserialize, Serialize};

use crate::config::sim_config::HostConfig;
use crate::workload_generators::events::ResourceVector;

/// One machine of the simulated fleet. Capacity is fixed at bootstrap;
/// `committed` changes only through `commit` and `release`.
pub struct ClusterHost {
    pub id: Id,
    pub name: String,
    pub capacity: ResourceVector,
    committed: ResourceVector,
    pub idle_power_watts: f64,
    pub peak_power_watts: f64,
}

impl ClusterHost {
    pub fn new(config: &HostConfig) -> Self {
        Self {
            id: config.id,
            name: config.name.clone(),
            capacity: config.capacity(),
            committed: ResourceVector::default(),
            idle_power_watts: config.idle_power_watts,
            peak_power_watts: config.peak_power_watts,
        }
    }

    pub fn committed(&self) -> ResourceVector {
        self.committed
    }

    pub fn free(&self) -> ResourceVector {
        self.capacity.subtracted(&self.committed)
    }

    pub fn can_fit(&self, demand: &ResourceVector) -> bool {
        demand.fit_into(&self.free())
    }

    /// Commits resources for a placement. The no-overcommit invariant is a
    /// scheduler contract violation if broken, so it panics rather than
    /// returning an error.
    pub fn commit(&mut self, demand: &ResourceVector) {
        let committed = self.committed.added(demand);
        assert!(
            committed.fit_into(&self.capacity),
            "host {} overcommitted: {:?} exceeds {:?}",
            self.name,
            committed,
            self.capacity
        );
        self.committed = committed;
    }

    pub fn release(&mut self, demand: &ResourceVector) {
        self.committed.subtract(demand);
    }

    /// Mean of per-dimension committed/capacity ratios.
    pub fn utilization(&self) -> f64 {
        self.committed.mean_share_of(&self.capacity)
    }

    fn cpu_utilization(&self) -> f64 {
        if self.capacity.cpu > 0. {
            self.committed.cpu / self.capacity.cpu
        } else {
            0.
        }
    }

    /// Instantaneous draw. A host with nothing committed is parked and draws
    /// nothing; an active host draws idle power plus a dynamic part
    /// proportional to its cpu utilization.
    pub fn power_watts(&self) -> f64 {
        if self.committed.is_zero() {
            0.
        } else {
            self.idle_power_watts
                + (self.peak_power_watts - self.idle_power_watts) * self.cpu_utilization()
        }
    }
}

/// Final per-host state carried into the trace for the resource-distribution
/// view.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HostSnapshot {
    pub name: String,
    pub capacity: ResourceVector,
    pub committed: ResourceVector,
    pub utilization: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> ClusterHost {
        ClusterHost::new(&HostConfig {
            id: 0,
            name: "host-0".to_string(),
            cpu: 8.,
            memory: 32.,
            storage: 100.,
            idle_power_watts: 100.,
            peak_power_watts: 400.,
            group_prefix: None,
        })
    }

    #[test]
    fn commit_and_release_track_free_capacity() {
        let mut host = host();
        let demand = ResourceVector::new(2., 8., 10.);
        assert!(host.can_fit(&demand));
        host.commit(&demand);
        assert_eq!(host.free(), ResourceVector::new(6., 24., 90.));
        host.release(&demand);
        assert_eq!(host.committed(), ResourceVector::default());
    }

    #[test]
    #[should_panic(expected = "overcommitted")]
    fn overcommit_panics() {
        let mut host = host();
        host.commit(&ResourceVector::new(9., 1., 1.));
    }

    #[test]
    fn parked_host_draws_nothing() {
        let mut host = host();
        assert_eq!(host.power_watts(), 0.);
        host.commit(&ResourceVector::new(4., 8., 10.));
        // idle + half of the dynamic span
        assert_eq!(host.power_watts(), 100. + 300. * 0.5);
    }
}
