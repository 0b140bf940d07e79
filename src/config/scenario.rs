use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::sim_config::{
    ClusterWorkloadConfig, GroupHostConfig, MonitoringConfig, SchedulerConfig, SimulationConfig,
};
use crate::error::SimulationError;
use crate::workload_generators::random::{DemandTier, Options};

/// The canned comparison scenarios, with the container volumes, demand tiers
/// and horizons the product describes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum ScenarioKind {
    /// Balanced mix of container types with varied requirements.
    MixedWorkload,
    /// Many small containers, scheduling efficiency at scale.
    HighDensity,
    /// Databases and caches: high memory demand.
    MemoryIntensive,
    /// Batch processing and analytics: high cpu demand.
    CpuIntensive,
    /// Arrival waves that exceed sustainable capacity.
    BurstLoad,
}

const TENANTS: [&str; 3] = ["analytics", "batch", "web"];

struct ScenarioParams {
    container_count: u32,
    cpu: DemandTier,
    memory: DemandTier,
    storage: DemandTier,
    simulation_time: f64,
    duration_mean: f64,
    duration_dev: f64,
    burst_count: Option<u32>,
    host_count: u32,
    host_cpu: f64,
    host_memory: f64,
    host_storage: f64,
}

impl ScenarioKind {
    pub fn all() -> [ScenarioKind; 5] {
        [
            ScenarioKind::MixedWorkload,
            ScenarioKind::HighDensity,
            ScenarioKind::MemoryIntensive,
            ScenarioKind::CpuIntensive,
            ScenarioKind::BurstLoad,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScenarioKind::MixedWorkload => "mixed-workload",
            ScenarioKind::HighDensity => "high-density",
            ScenarioKind::MemoryIntensive => "memory-intensive",
            ScenarioKind::CpuIntensive => "cpu-intensive",
            ScenarioKind::BurstLoad => "burst-load",
        }
    }

    fn params(&self) -> ScenarioParams {
        match self {
            ScenarioKind::MixedWorkload => ScenarioParams {
                container_count: 120,
                cpu: DemandTier::Medium,
                memory: DemandTier::Medium,
                storage: DemandTier::Medium,
                simulation_time: 60.,
                duration_mean: 8.,
                duration_dev: 2.,
                burst_count: None,
                host_count: 8,
                host_cpu: 8.,
                host_memory: 32.,
                host_storage: 128.,
            },
            ScenarioKind::HighDensity => ScenarioParams {
                container_count: 500,
                cpu: DemandTier::Low,
                memory: DemandTier::Low,
                storage: DemandTier::Low,
                simulation_time: 180.,
                duration_mean: 10.,
                duration_dev: 3.,
                burst_count: None,
                host_count: 10,
                host_cpu: 4.,
                host_memory: 16.,
                host_storage: 64.,
            },
            ScenarioKind::MemoryIntensive => ScenarioParams {
                container_count: 75,
                cpu: DemandTier::Medium,
                memory: DemandTier::High,
                storage: DemandTier::Medium,
                simulation_time: 90.,
                duration_mean: 12.,
                duration_dev: 3.,
                burst_count: None,
                host_count: 6,
                host_cpu: 8.,
                host_memory: 48.,
                host_storage: 128.,
            },
            ScenarioKind::CpuIntensive => ScenarioParams {
                container_count: 85,
                cpu: DemandTier::High,
                memory: DemandTier::Medium,
                storage: DemandTier::Low,
                simulation_time: 120.,
                duration_mean: 12.,
                duration_dev: 3.,
                burst_count: None,
                host_count: 6,
                host_cpu: 12.,
                host_memory: 32.,
                host_storage: 128.,
            },
            ScenarioKind::BurstLoad => ScenarioParams {
                container_count: 300,
                cpu: DemandTier::High,
                memory: DemandTier::High,
                storage: DemandTier::Medium,
                simulation_time: 45.,
                duration_mean: 10.,
                duration_dev: 2.5,
                burst_count: Some(5),
                host_count: 10,
                host_cpu: 16.,
                host_memory: 64.,
                host_storage: 256.,
            },
        }
    }

    /// Full simulation config for this scenario: the default host fleet plus
    /// one tier-driven workload block per tenant.
    pub fn config(&self) -> SimulationConfig {
        let params = self.params();
        let arrival_window = params.simulation_time * 0.8;

        let per_tenant = params.container_count / TENANTS.len() as u32;
        let remainder = params.container_count % TENANTS.len() as u32;

        let workload = TENANTS
            .iter()
            .enumerate()
            .map(|(i, tenant)| {
                let extra = if (i as u32) < remainder { 1 } else { 0 };
                let options = Options {
                    execution_count: per_tenant + extra,
                    cpu: params.cpu,
                    memory: params.memory,
                    storage: params.storage,
                    arrival_window,
                    start_time: None,
                    burst_count: params.burst_count,
                    duration_mean: params.duration_mean,
                    duration_dev: params.duration_dev,
                    user: Some(tenant.to_string()),
                    collection_id: Some(i as u64 + 1),
                };
                ClusterWorkloadConfig {
                    r#type: "random".to_string(),
                    options: Some(serde_yaml::to_value(options).unwrap()),
                }
            })
            .collect();

        SimulationConfig {
            scenario: Some(self.label().to_string()),
            hosts: vec![GroupHostConfig::uniform(
                "node",
                params.host_count,
                params.host_cpu,
                params.host_memory,
                params.host_storage,
            )],
            workload: Some(workload),
            simulation_time: Some(params.simulation_time),
            scheduler: SchedulerConfig {
                sample_interval: Some(1.0),
                fuse: None,
            },
            monitoring: Some(MonitoringConfig {
                host_load_compression_time_interval: Some(1.0),
                collect_user_queues: Some(true),
            }),
        }
    }
}

impl FromStr for ScenarioKind {
    type Err = SimulationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "mixed-workload" => Ok(ScenarioKind::MixedWorkload),
            "high-density" => Ok(ScenarioKind::HighDensity),
            "memory-intensive" => Ok(ScenarioKind::MemoryIntensive),
            "cpu-intensive" => Ok(ScenarioKind::CpuIntensive),
            "burst-load" => Ok(ScenarioKind::BurstLoad),
            other => Err(SimulationError::InvalidConfig(format!(
                "unknown scenario `{}`",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for kind in ScenarioKind::all() {
            kind.config().validate().unwrap();
        }
    }

    #[test]
    fn tenant_split_preserves_container_count() {
        for kind in ScenarioKind::all() {
            let config = kind.config();
            let total: u32 = config
                .workload
                .unwrap()
                .iter()
                .map(|w| {
                    serde_yaml::from_value::<Options>(w.options.clone().unwrap())
                        .unwrap()
                        .execution_count
                })
                .sum();
            assert_eq!(total, kind.params().container_count);
        }
    }
}
