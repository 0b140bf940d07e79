use dslab_core::SimulationContext;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

use super::{
    events::{CollectionRequest, ExecutionRequest, ResourceVector},
    generator::WorkloadGenerator,
};

/// Demand level of one resource dimension, mapped to a sampling range.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DemandTier {
    Low,
    Medium,
    High,
}

impl DemandTier {
    pub fn cpu_range(&self) -> (f64, f64) {
        match self {
            DemandTier::Low => (0.25, 0.75),
            DemandTier::Medium => (1.0, 2.0),
            DemandTier::High => (2.0, 4.0),
        }
    }

    pub fn memory_range(&self) -> (f64, f64) {
        match self {
            DemandTier::Low => (0.25, 1.0),
            DemandTier::Medium => (2.0, 4.0),
            DemandTier::High => (4.0, 8.0),
        }
    }

    pub fn storage_range(&self) -> (f64, f64) {
        match self {
            DemandTier::Low => (1.0, 4.0),
            DemandTier::Medium => (4.0, 8.0),
            DemandTier::High => (8.0, 16.0),
        }
    }
}

#[derive(Serialize, Deserialize, Clone)]
pub struct Options {
    pub execution_count: u32,
    pub cpu: DemandTier,
    pub memory: DemandTier,
    pub storage: DemandTier,
    /// Window over which arrivals are spread, starting at `start_time`.
    pub arrival_window: f64,
    pub start_time: Option<f64>,
    /// When set, arrivals are compressed into this many waves instead of
    /// being spread uniformly.
    pub burst_count: Option<u32>,
    pub duration_mean: f64,
    pub duration_dev: f64,
    pub user: Option<String>,
    pub collection_id: Option<u64>,
}

/// Synthetic tier-driven request stream. One generator produces the workload
/// of one tenant; multi-tenant scenarios declare one block per tenant.
/// All sampling goes through the simulation context, so the stream is a pure
/// function of the seed.
pub struct RandomWorkloadGenerator {
    options: Options,
    generated_count: u64,
    last_time: f64,
}

impl RandomWorkloadGenerator {
    pub fn from_options(options: &serde_yaml::Value) -> Result<Self, SimulationError> {
        let options: Options = serde_yaml::from_value(options.clone()).map_err(|e| {
            SimulationError::InvalidConfig(format!("bad random workload options: {}", e))
        })?;
        Self::new(options)
    }

    pub fn new(options: Options) -> Result<Self, SimulationError> {
        if options.execution_count == 0 {
            return Err(SimulationError::InvalidConfig(
                "execution_count must be positive".to_string(),
            ));
        }
        if options.arrival_window <= 0. {
            return Err(SimulationError::InvalidConfig(
                "arrival_window must be positive".to_string(),
            ));
        }
        if options.burst_count == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "burst_count must be positive".to_string(),
            ));
        }
        if options.duration_mean <= 0. || options.duration_dev < 0. {
            return Err(SimulationError::InvalidConfig(
                "bad duration distribution".to_string(),
            ));
        }
        let last_time = options.start_time.unwrap_or(0.);
        Ok(Self {
            options,
            generated_count: 0,
            last_time,
        })
    }

    fn sample_demand(&self, ctx: &SimulationContext) -> ResourceVector {
        let (cpu_min, cpu_max) = self.options.cpu.cpu_range();
        let (mem_min, mem_max) = self.options.memory.memory_range();
        let (disk_min, disk_max) = self.options.storage.storage_range();
        ResourceVector::new(
            ctx.gen_range(cpu_min..=cpu_max),
            ctx.gen_range(mem_min..=mem_max),
            ctx.gen_range(disk_min..=disk_max),
        )
    }

    fn next_arrival(&mut self, ctx: &SimulationContext, index: u64) -> f64 {
        let start = self.options.start_time.unwrap_or(0.);
        let count = self.options.execution_count as u64;
        let time = match self.options.burst_count {
            Some(waves) => {
                let waves = waves as u64;
                let wave_len = self.options.arrival_window / waves as f64;
                let wave = index * waves / count;
                let index_in_wave = index - wave * count / waves;
                start + wave as f64 * wave_len + (index_in_wave + 1) as f64 * 1e-3
            }
            None => {
                let mean_gap = self.options.arrival_window / count as f64;
                self.last_time + ctx.gen_range(0.5..=1.5) * mean_gap
            }
        };
        let time = time.max(self.last_time);
        self.last_time = time;
        time
    }
}

impl WorkloadGenerator for RandomWorkloadGenerator {
    fn get_workload(
        &mut self,
        ctx: &SimulationContext,
        limit: Option<u64>,
    ) -> Vec<ExecutionRequest> {
        let remaining = self.options.execution_count as u64 - self.generated_count;
        let limit = limit.map_or(remaining, |limit| limit.min(remaining));

        let duration_distribution =
            rand_distr::Normal::new(self.options.duration_mean, self.options.duration_dev).unwrap();

        let mut workload = Vec::with_capacity(limit as usize);
        for _ in 0..limit {
            let index = self.generated_count;
            let time = self.next_arrival(ctx, index);
            let duration: f64 = ctx.sample_from_distribution(&duration_distribution);
            workload.push(ExecutionRequest {
                id: None,
                name: None,
                collection_id: self.options.collection_id,
                time,
                demand: self.sample_demand(ctx),
                duration: Some(duration.max(1.)),
                priority: None,
            });
            self.generated_count += 1;
        }
        workload
    }

    fn get_collections(&self, _ctx: &SimulationContext) -> Vec<CollectionRequest> {
        match &self.options.user {
            Some(user) => vec![CollectionRequest {
                id: self.options.collection_id,
                time: self.options.start_time.unwrap_or(0.),
                user: Some(user.clone()),
                priority: None,
            }],
            None => vec![],
        }
    }

    fn get_full_size_hint(&self) -> Option<u64> {
        Some(self.options.execution_count as u64)
    }
}
