use dslab_core::Id;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::scheduler::fuse::FuseWeights;
use crate::workload_generators::events::ResourceVector;

pub const DEFAULT_IDLE_POWER_WATTS: f64 = 100.;
pub const DEFAULT_PEAK_POWER_WATTS: f64 = 400.;

/// Declares a group of identical hosts. `count = None` means a single host.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupHostConfig {
    pub name: Option<String>,
    pub name_prefix: Option<String>,
    pub count: Option<u32>,

    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,

    pub idle_power_watts: Option<f64>,
    pub peak_power_watts: Option<f64>,
}

impl GroupHostConfig {
    pub fn uniform(name_prefix: &str, count: u32, cpu: f64, memory: f64, storage: f64) -> Self {
        Self {
            name: None,
            name_prefix: Some(name_prefix.to_string()),
            count: Some(count),
            cpu,
            memory,
            storage,
            idle_power_watts: None,
            peak_power_watts: None,
        }
    }
}

/// One concrete host of the simulated fleet.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HostConfig {
    #[serde(skip)]
    pub id: Id,
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
    pub idle_power_watts: f64,
    pub peak_power_watts: f64,
    pub group_prefix: Option<String>,
}

impl HostConfig {
    pub fn from_group_config(group: &GroupHostConfig, idx: Option<u32>) -> Self {
        let name = match idx {
            Some(idx) => format!(
                "{}-{}",
                group.name_prefix.as_deref().unwrap_or("host"),
                idx
            ),
            None => group
                .name
                .clone()
                .unwrap_or_else(|| group.name_prefix.clone().unwrap_or_else(|| "host".to_string())),
        };
        Self {
            id: Id::MAX,
            name,
            cpu: group.cpu,
            memory: group.memory,
            storage: group.storage,
            idle_power_watts: group.idle_power_watts.unwrap_or(DEFAULT_IDLE_POWER_WATTS),
            peak_power_watts: group.peak_power_watts.unwrap_or(DEFAULT_PEAK_POWER_WATTS),
            group_prefix: group.name_prefix.clone(),
        }
    }

    pub fn capacity(&self) -> ResourceVector {
        ResourceVector::new(self.cpu, self.memory, self.storage)
    }
}

/// Workload source declaration: a generator type plus its option block,
/// resolved by `workload_generators::workload_type::workload_resolver`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ClusterWorkloadConfig {
    pub r#type: String,
    pub options: Option<serde_yaml::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SchedulerConfig {
    /// Interval of the cluster-wide utilization sampling tick. Defaults to
    /// one second of simulated time.
    pub sample_interval: Option<f64>,
    /// FUSE weight configuration; ignored by the other strategies.
    pub fuse: Option<FuseWeights>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MonitoringConfig {
    pub host_load_compression_time_interval: Option<f64>,
    pub collect_user_queues: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SimulationConfig {
    /// Label carried into traces and results.
    pub scenario: Option<String>,
    pub hosts: Vec<GroupHostConfig>,
    pub workload: Option<Vec<ClusterWorkloadConfig>>,
    /// Simulated horizon in seconds. Requests still unplaced when it passes
    /// are failed placements; without a horizon the run lasts until the event
    /// queue drains.
    pub simulation_time: Option<f64>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    pub monitoring: Option<MonitoringConfig>,
}

impl SimulationConfig {
    pub fn from_file(file_name: &str) -> Result<Self, SimulationError> {
        let content = std::fs::read_to_string(file_name).map_err(|e| {
            SimulationError::InvalidConfig(format!("can't read config {}: {}", file_name, e))
        })?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> Result<Self, SimulationError> {
        serde_yaml::from_str(content)
            .map_err(|e| SimulationError::InvalidConfig(format!("can't parse config: {}", e)))
    }

    /// Rejects configurations that cannot produce a meaningful run. Workload
    /// option blocks are validated later, by the generator resolver.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.hosts.is_empty() {
            return Err(SimulationError::InvalidConfig("empty host fleet".to_string()));
        }
        for group in &self.hosts {
            if group.count == Some(0) {
                return Err(SimulationError::InvalidConfig(format!(
                    "host group {:?} has zero count",
                    group.name_prefix
                )));
            }
            let capacity = ResourceVector::new(group.cpu, group.memory, group.storage);
            if group.cpu < 0. || group.memory < 0. || group.storage < 0. || capacity.is_zero() {
                return Err(SimulationError::InvalidConfig(format!(
                    "host group {:?} has no usable capacity",
                    group.name_prefix
                )));
            }
            let idle = group.idle_power_watts.unwrap_or(DEFAULT_IDLE_POWER_WATTS);
            let peak = group.peak_power_watts.unwrap_or(DEFAULT_PEAK_POWER_WATTS);
            if idle < 0. || peak < idle {
                return Err(SimulationError::InvalidConfig(format!(
                    "host group {:?} has an inconsistent power model",
                    group.name_prefix
                )));
            }
        }
        match &self.workload {
            None => {
                return Err(SimulationError::InvalidConfig("no workload declared".to_string()));
            }
            Some(workload) if workload.is_empty() => {
                return Err(SimulationError::InvalidConfig("no workload declared".to_string()));
            }
            _ => {}
        }
        if let Some(simulation_time) = self.simulation_time {
            if simulation_time <= 0. {
                return Err(SimulationError::InvalidConfig(
                    "simulation_time must be positive".to_string(),
                ));
            }
        }
        if let Some(interval) = self.scheduler.sample_interval {
            if interval <= 0. {
                return Err(SimulationError::InvalidConfig(
                    "sample_interval must be positive".to_string(),
                ));
            }
        }
        if let Some(fuse) = &self.scheduler.fuse {
            fuse.validate()?;
        }
        Ok(())
    }
}
