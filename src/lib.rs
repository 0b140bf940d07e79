#![doc = include_str!("../readme.md")]

pub mod cluster;
pub mod cluster_events;
pub mod config;
pub mod error;
pub mod host;
pub mod metrics;
pub mod monitoring;
pub mod parallel_launcher;
pub mod proxy;
pub mod scheduler;
pub mod simulation;
pub mod storage;
pub mod workload_generators;

mod workload_queue_watcher;

pub use config::scenario::ScenarioKind;
pub use config::sim_config::SimulationConfig;
pub use error::SimulationError;
pub use metrics::{MetricsAggregator, SimulationResult};
pub use parallel_launcher::ParallelSimulationsLauncher;
pub use scheduler::{Scheduler, StrategyKind};
pub use simulation::{RunStatus, SchedulingSimulation, SimulationTrace};
pub use workload_generators::events::{ExecutionRequest, ResourceVector};
pub use workload_generators::generator::WorkloadGenerator;
