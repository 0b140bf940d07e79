use crate::error::SimulationError;
use crate::metrics::{MetricsAggregator, SimulationResult};
use crate::scheduler::StrategyKind;
use crate::simulation::{RunStatus, SchedulingSimulation};

struct PreparedRun {
    simulation: SchedulingSimulation,
    strategy: StrategyKind,
}

/// Runs independent simulations (one per strategy × scenario × trial), each
/// on its own thread with its own cluster state, and returns the aggregated
/// results in submission order.
#[derive(Default)]
pub struct ParallelSimulationsLauncher {
    runs: Vec<PreparedRun>,
}

impl ParallelSimulationsLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_run(&mut self, simulation: SchedulingSimulation, strategy: StrategyKind) {
        self.runs.push(PreparedRun { simulation, strategy });
    }

    pub fn run_simulations(self) -> Vec<Result<SimulationResult, SimulationError>> {
        let mut threads = Vec::new();
        for run in self.runs.into_iter() {
            threads.push(std::thread::spawn(move || {
                let PreparedRun {
                    mut simulation,
                    strategy,
                } = run;
                let status = simulation.run_with_strategy(&strategy)?;
                if status != RunStatus::Completed {
                    return Err(SimulationError::IncompleteTrace(status));
                }
                MetricsAggregator::aggregate(&simulation.into_trace())
            }));
        }

        threads
            .into_iter()
            .map(|thread| thread.join().expect("simulation thread panicked"))
            .collect()
    }
}
