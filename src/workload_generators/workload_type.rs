use std::{cell::RefCell, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::config::sim_config::ClusterWorkloadConfig;
use crate::error::SimulationError;

use super::{
    generator::WorkloadGenerator, native::NativeWorkloadGenerator, random::RandomWorkloadGenerator,
};

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub enum WorkloadType {
    Random,
    Native,
}

impl FromStr for WorkloadType {
    type Err = SimulationError;

    fn from_str(input: &str) -> Result<WorkloadType, Self::Err> {
        match input.to_lowercase().as_str() {
            "random" => Ok(WorkloadType::Random),
            "native" => Ok(WorkloadType::Native),
            other => Err(SimulationError::InvalidConfig(format!(
                "unknown workload type `{}`",
                other
            ))),
        }
    }
}

pub fn workload_resolver(
    config: &ClusterWorkloadConfig,
) -> Result<Box<RefCell<dyn WorkloadGenerator>>, SimulationError> {
    let workload_type = WorkloadType::from_str(&config.r#type)?;
    let options = config.options.clone().ok_or_else(|| {
        SimulationError::InvalidConfig(format!("{:?} workload options are required", workload_type))
    })?;

    match workload_type {
        WorkloadType::Random => Ok(Box::new(RefCell::new(RandomWorkloadGenerator::from_options(
            &options,
        )?))),
        WorkloadType::Native => Ok(Box::new(RefCell::new(NativeWorkloadGenerator::from_options(
            &options,
        )?))),
    }
}
