use fuse_scheduling::config::sim_config::{
    ClusterWorkloadConfig, GroupHostConfig, SimulationConfig,
};
use fuse_scheduling::scheduler::fuse::FuseWeights;
use fuse_scheduling::{
    MetricsAggregator, RunStatus, ScenarioKind, SchedulingSimulation, SimulationError,
    StrategyKind,
};

#[test]
fn aggregation_is_idempotent() {
    let mut simulation =
        SchedulingSimulation::from_seed(42, ScenarioKind::MixedWorkload.config()).unwrap();
    simulation
        .run_with_strategy(&StrategyKind::Fuse(FuseWeights::default()))
        .unwrap();
    let trace = simulation.into_trace();

    let first = MetricsAggregator::aggregate(&trace).unwrap();
    let second = MetricsAggregator::aggregate(&trace).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn aborted_runs_are_refused_by_the_aggregator() {
    let mut simulation =
        SchedulingSimulation::from_seed(42, ScenarioKind::MixedWorkload.config()).unwrap();
    simulation.abort_handle().abort();
    let status = simulation.run_with_strategy(&StrategyKind::BinPacking).unwrap();
    assert_eq!(status, RunStatus::Aborted);

    let trace = simulation.into_trace();
    assert_eq!(trace.status, RunStatus::Aborted);
    assert_eq!(
        MetricsAggregator::aggregate(&trace),
        Err(SimulationError::IncompleteTrace(RunStatus::Aborted))
    );
}

#[test]
fn invalid_configs_abort_before_any_event() {
    // empty fleet
    let config = SimulationConfig {
        scenario: None,
        hosts: vec![],
        workload: Some(vec![]),
        simulation_time: None,
        scheduler: Default::default(),
        monitoring: None,
    };
    assert!(matches!(
        SchedulingSimulation::from_seed(1, config),
        Err(SimulationError::InvalidConfig(_))
    ));

    // no workload at all
    let config = SimulationConfig {
        scenario: None,
        hosts: vec![GroupHostConfig::uniform("node", 2, 4., 8., 16.)],
        workload: None,
        simulation_time: None,
        scheduler: Default::default(),
        monitoring: None,
    };
    assert!(matches!(
        SchedulingSimulation::from_seed(1, config),
        Err(SimulationError::InvalidConfig(_))
    ));

    // non-positive container count in the generator options
    let mut config = ScenarioKind::MixedWorkload.config();
    let options = serde_yaml::from_str("
        execution_count: 0
        cpu: medium
        memory: medium
        storage: medium
        arrival_window: 10.0
        duration_mean: 5.0
        duration_dev: 1.0
    ")
    .unwrap();
    config.workload = Some(vec![ClusterWorkloadConfig {
        r#type: "random".to_string(),
        options: Some(options),
    }]);
    assert!(matches!(
        SchedulingSimulation::from_seed(1, config),
        Err(SimulationError::InvalidConfig(_))
    ));
}

#[test]
fn fuse_weights_must_sum_to_one() {
    assert!(FuseWeights::new(0.6, 0.4).validate().is_ok());
    assert!(FuseWeights::new(0.8, 0.4).validate().is_err());
    assert!(FuseWeights::new(-0.2, 1.2).validate().is_err());

    let mut simulation =
        SchedulingSimulation::from_seed(1, ScenarioKind::MixedWorkload.config()).unwrap();
    let result = simulation.run_with_strategy(&StrategyKind::Fuse(FuseWeights::new(0.9, 0.2)));
    assert!(matches!(result, Err(SimulationError::InvalidConfig(_))));
}

#[test]
fn metrics_are_derived_from_the_trace_only() {
    let mut simulation =
        SchedulingSimulation::from_seed(42, ScenarioKind::MixedWorkload.config()).unwrap();
    simulation.run_with_strategy(&StrategyKind::BinPacking).unwrap();
    let trace = simulation.into_trace();
    let result = MetricsAggregator::aggregate(&trace).unwrap();

    assert_eq!(result.failed_containers, trace.rejected);
    assert_eq!(
        result.scheduling_success_rate,
        trace.placed as f64 / trace.total_requests as f64 * 100.
    );
    let mean_latency = trace
        .decisions
        .iter()
        .map(|decision| decision.decision_latency_ms)
        .sum::<f64>()
        / trace.decisions.len() as f64;
    assert_eq!(result.average_scheduling_time, mean_latency);
    assert_eq!(result.utilization_timeline, trace.samples);
    assert_eq!(result.host_utilization, trace.hosts);
    assert!(result.resource_utilization > 0.);
    assert!(result.energy_efficiency > 0.);
    assert!(result.makespan > 0.);
}
