use fuse_scheduling::scheduler::fuse::FuseWeights;
use fuse_scheduling::{
    MetricsAggregator, RunStatus, ScenarioKind, SchedulingSimulation, SimulationTrace,
    StrategyKind,
};

fn run(scenario: ScenarioKind, strategy: &StrategyKind, seed: u64) -> SimulationTrace {
    let mut simulation = SchedulingSimulation::from_seed(seed, scenario.config()).unwrap();
    let status = simulation.run_with_strategy(strategy).unwrap();
    assert_eq!(status, RunStatus::Completed);
    simulation.into_trace()
}

#[test]
fn repeated_runs_are_bit_identical() {
    for strategy in [
        StrategyKind::BinPacking,
        StrategyKind::Drf,
        StrategyKind::Fuse(FuseWeights::default()),
    ] {
        let first = run(ScenarioKind::MixedWorkload, &strategy, 42);
        let second = run(ScenarioKind::MixedWorkload, &strategy, 42);
        assert_eq!(first, second);

        let first_result = MetricsAggregator::aggregate(&first).unwrap();
        let second_result = MetricsAggregator::aggregate(&second).unwrap();
        assert_eq!(
            serde_json::to_string(&first_result).unwrap(),
            serde_json::to_string(&second_result).unwrap()
        );
    }
}

#[test]
fn different_seeds_shift_the_request_stream() {
    let first = run(ScenarioKind::MixedWorkload, &StrategyKind::BinPacking, 1);
    let second = run(ScenarioKind::MixedWorkload, &StrategyKind::BinPacking, 2);
    assert_eq!(first.total_requests, second.total_requests);
    assert_ne!(first.decisions, second.decisions);
}

#[test]
fn parallel_runs_match_sequential_runs() {
    use fuse_scheduling::ParallelSimulationsLauncher;

    let strategies = [
        StrategyKind::BinPacking,
        StrategyKind::Drf,
        StrategyKind::Fuse(FuseWeights::default()),
    ];

    let mut launcher = ParallelSimulationsLauncher::new();
    for strategy in &strategies {
        let simulation =
            SchedulingSimulation::from_seed(42, ScenarioKind::MemoryIntensive.config()).unwrap();
        launcher.add_run(simulation, strategy.clone());
    }
    let parallel: Vec<_> = launcher
        .run_simulations()
        .into_iter()
        .map(|result| result.unwrap())
        .collect();

    for (strategy, parallel_result) in strategies.iter().zip(parallel) {
        let sequential =
            MetricsAggregator::aggregate(&run(ScenarioKind::MemoryIntensive, strategy, 42))
                .unwrap();
        assert_eq!(sequential, parallel_result);
    }
}
