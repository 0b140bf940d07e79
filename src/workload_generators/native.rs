use dslab_core::SimulationContext;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

use super::{
    events::{CollectionRequest, ExecutionRequest, ResourceVector},
    generator::WorkloadGenerator,
};

#[derive(Serialize, Deserialize, Clone)]
pub struct NativeExecutionDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub submit_time: f64,
    pub demand: ResourceVector,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<u64>,
}

#[derive(Deserialize)]
struct Options {
    path: Option<String>,
    requests: Option<Vec<NativeExecutionDefinition>>,
    collections: Option<Vec<CollectionRequest>>,
}

/// Fixed request list declared inline in the config or in a separate YAML
/// file. The deterministic fixture path used by most tests.
pub struct NativeWorkloadGenerator {
    workload: Vec<NativeExecutionDefinition>,
    collections: Vec<CollectionRequest>,
    exhausted: bool,
}

impl NativeWorkloadGenerator {
    pub fn from_options(options: &serde_yaml::Value) -> Result<Self, SimulationError> {
        let options: Options = serde_yaml::from_value(options.clone()).map_err(|e| {
            SimulationError::InvalidConfig(format!("bad native workload options: {}", e))
        })?;

        let workload = match (options.requests, &options.path) {
            (Some(requests), _) => requests,
            (None, Some(path)) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    SimulationError::InvalidConfig(format!("can't read workload {}: {}", path, e))
                })?;
                serde_yaml::from_str(&content).map_err(|e| {
                    SimulationError::InvalidConfig(format!("can't parse workload {}: {}", path, e))
                })?
            }
            (None, None) => {
                return Err(SimulationError::InvalidConfig(
                    "native workload needs `requests` or `path`".to_string(),
                ));
            }
        };

        Ok(Self::from_requests(
            workload,
            options.collections.unwrap_or_default(),
        ))
    }

    pub fn from_requests(
        mut workload: Vec<NativeExecutionDefinition>,
        collections: Vec<CollectionRequest>,
    ) -> Self {
        workload.sort_by(|a, b| a.submit_time.partial_cmp(&b.submit_time).unwrap());
        NativeWorkloadGenerator {
            workload,
            collections,
            exhausted: false,
        }
    }
}

impl WorkloadGenerator for NativeWorkloadGenerator {
    fn get_workload(
        &mut self,
        _ctx: &SimulationContext,
        _limit: Option<u64>,
    ) -> Vec<ExecutionRequest> {
        if self.exhausted {
            return vec![];
        }
        self.exhausted = true;
        self.workload
            .iter()
            .map(|job| ExecutionRequest {
                id: job.id,
                name: job.name.clone(),
                collection_id: job.collection_id,
                time: job.submit_time,
                demand: job.demand,
                duration: job.duration,
                priority: job.priority,
            })
            .collect()
    }

    fn get_collections(&self, _ctx: &SimulationContext) -> Vec<CollectionRequest> {
        self.collections.clone()
    }

    fn get_full_size_hint(&self) -> Option<u64> {
        Some(self.workload.len() as u64)
    }
}
