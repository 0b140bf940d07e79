use serde::{Deserialize, Serialize};

use crate::error::SimulationError;
use crate::host::HostSnapshot;
use crate::monitoring::UtilizationSample;
use crate::simulation::{RunStatus, SimulationTrace};

/// Summary of one strategy on one scenario. Derived strictly from the trace;
/// recomputable at any time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationResult {
    pub scenario: String,
    pub strategy: String,
    pub seed: Option<u64>,

    /// Placed requests as a percentage of all requests.
    pub scheduling_success_rate: f64,
    /// Mean simulated decision latency, in milliseconds.
    pub average_scheduling_time: f64,
    /// Mean cluster utilization over the sampled time series, in percent.
    pub resource_utilization: f64,
    /// Share of the drawn energy that went into useful (dynamic) load,
    /// in percent.
    pub energy_efficiency: f64,
    pub failed_containers: u64,

    pub makespan: f64,
    pub total_energy_joules: f64,
    pub utilization_timeline: Vec<UtilizationSample>,
    pub host_utilization: Vec<HostSnapshot>,
}

/// Pure reduction of a completed trace into the comparison metrics. Holds no
/// state: aggregating the same trace twice yields identical results.
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn aggregate(trace: &SimulationTrace) -> Result<SimulationResult, SimulationError> {
        if trace.status != RunStatus::Completed {
            return Err(SimulationError::IncompleteTrace(trace.status));
        }

        let total = trace.total_requests;
        let scheduling_success_rate = if total > 0 {
            trace.placed as f64 / total as f64 * 100.
        } else {
            0.
        };

        let average_scheduling_time = if trace.decisions.is_empty() {
            0.
        } else {
            trace
                .decisions
                .iter()
                .map(|decision| decision.decision_latency_ms)
                .sum::<f64>()
                / trace.decisions.len() as f64
        };

        let resource_utilization = if trace.samples.is_empty() {
            0.
        } else {
            trace
                .samples
                .iter()
                .map(|sample| sample.utilization)
                .sum::<f64>()
                / trace.samples.len() as f64
                * 100.
        };

        let total_energy = trace.energy.total_joules();
        let energy_efficiency = if total_energy > 0. {
            trace.energy.dynamic_joules / total_energy * 100.
        } else {
            0.
        };

        Ok(SimulationResult {
            scenario: trace.scenario.clone(),
            strategy: trace.strategy.clone(),
            seed: trace.seed,
            scheduling_success_rate,
            average_scheduling_time,
            resource_utilization,
            energy_efficiency,
            failed_containers: trace.rejected,
            makespan: trace.makespan,
            total_energy_joules: total_energy,
            utilization_timeline: trace.samples.clone(),
            host_utilization: trace.hosts.clone(),
        })
    }
}
