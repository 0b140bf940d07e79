use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::Rc,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use sugars::{rc, refcell};

use dslab_core::{EventHandler, Id, Simulation};

use crate::cluster::Cluster;
use crate::cluster_events::HostAdded;
use crate::config::sim_config::{GroupHostConfig, HostConfig, SimulationConfig};
use crate::error::SimulationError;
use crate::host::HostSnapshot;
use crate::monitoring::{
    DominantSharePoint, EnergyReport, Monitoring, ResourcePoint, UtilizationSample,
};
use crate::proxy::Proxy;
use crate::scheduler::{
    bin_packing::BinPackingScheduler, drf::DrfScheduler, fuse::FuseScheduler, CustomScheduler,
    Scheduler, SchedulerInvoker, StrategyKind,
};
use crate::storage::{DecisionOutcome, PlacementDecision, RejectReason, SharedInfoStorage};
use crate::workload_generators::workload_type::workload_resolver;
use crate::workload_queue_watcher::WorkloadQueueWatcher;

/// Lifecycle of one scenario run.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum RunStatus {
    Initialized,
    Running,
    Completed,
    Aborted,
}

/// Cooperative cancellation flag, checked between event steps.
#[derive(Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Finalized record of one run, handed to the metrics aggregator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationTrace {
    pub scenario: String,
    pub strategy: String,
    pub seed: Option<u64>,
    pub status: RunStatus,
    pub total_requests: u64,
    pub placed: u64,
    pub rejected: u64,
    pub decisions: Vec<PlacementDecision>,
    pub samples: Vec<UtilizationSample>,
    pub hosts: Vec<HostSnapshot>,
    pub dominant_shares: Vec<DominantSharePoint>,
    pub queue_sizes: Vec<ResourcePoint>,
    pub queue_sizes_by_user: BTreeMap<String, Vec<ResourcePoint>>,
    pub energy: EnergyReport,
    pub makespan: f64,
    pub end_time: f64,
}

/// Drives one scenario: builds the cluster and the request stream from a
/// validated config, installs one strategy and runs the event loop to
/// completion (or cooperative abort). Owns all of its state, so independent
/// runs can execute on separate threads.
pub struct SchedulingSimulation {
    sim: Simulation,

    cluster: Rc<RefCell<Cluster>>,
    proxy: Rc<RefCell<Proxy>>,
    monitoring: Rc<RefCell<Monitoring>>,
    workload_queue_watcher: Rc<RefCell<WorkloadQueueWatcher>>,

    shared_info_storage: Rc<RefCell<SharedInfoStorage>>,

    scheduler: Option<Rc<RefCell<dyn CustomScheduler>>>,
    scheduler_handler: Option<Rc<RefCell<dyn EventHandler>>>,

    scenario: String,
    seed: Option<u64>,
    horizon: Option<f64>,
    status: RunStatus,
    abort: AbortHandle,
    wall_clock_budget: Option<Duration>,
}

unsafe impl Send for SchedulingSimulation {}

impl SchedulingSimulation {
    /// Builds a run from a seeded dslab simulation and a scenario config.
    /// Fails (and processes nothing) if the configuration is unusable.
    pub fn new(mut sim: Simulation, config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        let monitoring = rc!(refcell!(Monitoring::new(
            config.monitoring.clone().unwrap_or_default(),
            config.scheduler.sample_interval,
        )));
        let shared_storage = rc!(refcell!(SharedInfoStorage::default()));

        let cluster_ctx = sim.create_context("cluster");
        let cluster = rc!(refcell!(Cluster::new(
            cluster_ctx,
            shared_storage.clone(),
            monitoring.clone(),
        )));
        sim.add_handler("cluster", cluster.clone());
        let cluster_id = cluster.borrow().get_id();

        let proxy_ctx = sim.create_context("proxy");
        let proxy = rc!(refcell!(Proxy::new(
            proxy_ctx,
            shared_storage.clone(),
            monitoring.clone(),
        )));
        sim.add_handler("proxy", proxy.clone());

        let workload_generators = config
            .workload
            .as_ref()
            .unwrap()
            .iter()
            .map(workload_resolver)
            .collect::<Result<Vec<_>, _>>()?;

        let generator_ctx = sim.create_context("queue_watcher");
        let workload_queue_watcher = rc!(refcell!(WorkloadQueueWatcher::new(
            generator_ctx,
            shared_storage.clone(),
            proxy.borrow().get_id(),
            cluster_id,
            workload_generators,
        )));
        sim.add_handler("queue_watcher", workload_queue_watcher.clone());

        let mut simulation = SchedulingSimulation {
            sim,
            cluster,
            proxy,
            monitoring,
            workload_queue_watcher,
            shared_info_storage: shared_storage,
            scheduler: None,
            scheduler_handler: None,
            scenario: config.scenario.clone().unwrap_or_else(|| "custom".to_string()),
            seed: None,
            horizon: config.simulation_time,
            status: RunStatus::Initialized,
            abort: AbortHandle::default(),
            wall_clock_budget: None,
        };

        simulation.build_cluster(&config.hosts);

        Ok(simulation)
    }

    /// Convenience constructor that also remembers the seed for the trace.
    pub fn from_seed(seed: u64, config: SimulationConfig) -> Result<Self, SimulationError> {
        let mut simulation = Self::new(Simulation::new(seed), config)?;
        simulation.seed = Some(seed);
        Ok(simulation)
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Wall-clock limit imposed by the caller; overrun counts as an abort.
    pub fn set_wall_clock_budget(&mut self, budget: Duration) {
        self.wall_clock_budget = Some(budget);
    }

    pub fn get_cluster_id(&self) -> Id {
        self.cluster.borrow().get_id()
    }

    fn build_cluster(&mut self, hosts_groups: &[GroupHostConfig]) {
        for host_group in hosts_groups {
            if host_group.count.unwrap_or(1) == 1 {
                self.build_host(HostConfig::from_group_config(host_group, None));
            } else {
                for i in 0..host_group.count.unwrap() {
                    self.build_host(HostConfig::from_group_config(host_group, Some(i)));
                }
            }
        }
    }

    fn build_host(&mut self, mut host_config: HostConfig) {
        let host_ctx = self.sim.create_context(format!("host-{}", host_config.name));
        host_config.id = host_ctx.id();
        self.cluster.borrow_mut().add_host(host_config);
    }

    pub fn set_custom_scheduler<T: CustomScheduler + EventHandler + 'static>(
        &mut self,
        scheduler: T,
    ) {
        let pointer = Rc::new(RefCell::new(scheduler));
        self.scheduler = Some(pointer.clone());
        self.scheduler_handler = Some(pointer);
    }

    pub fn set_scheduler<T: Scheduler + 'static>(&mut self, scheduler: T) {
        // the handler is registered under the scheduler's name, so the
        // context must carry the same name for events to reach it
        let ctx = self.sim.create_context(scheduler.name());
        let invoker = SchedulerInvoker::new(scheduler, ctx, self.get_cluster_id());
        self.set_custom_scheduler(invoker);
    }

    pub fn run_with_scheduler<T: Scheduler + 'static>(&mut self, scheduler: T) -> RunStatus {
        self.set_scheduler(scheduler);
        self.run()
    }

    pub fn run_with_strategy(&mut self, kind: &StrategyKind) -> Result<RunStatus, SimulationError> {
        match kind {
            StrategyKind::BinPacking => Ok(self.run_with_scheduler(BinPackingScheduler::new())),
            StrategyKind::Drf => Ok(self.run_with_scheduler(DrfScheduler::new())),
            StrategyKind::Fuse(weights) => {
                weights.validate()?;
                Ok(self.run_with_scheduler(FuseScheduler::new(*weights)))
            }
        }
    }

    pub fn run(&mut self) -> RunStatus {
        let scheduler = self.scheduler.as_ref().expect("no scheduler installed").clone();
        let scheduler_id = scheduler.borrow().id();
        let name = scheduler.borrow().name();

        self.sim
            .add_handler(name, self.scheduler_handler.as_ref().unwrap().clone());

        let host_generator_ctx = self.sim.create_context("host_generator");
        for host in self.cluster.borrow().get_hosts() {
            host_generator_ctx.emit_now(HostAdded { host }, scheduler_id);
        }

        self.cluster.borrow_mut().set_scheduler(scheduler_id);
        self.proxy.borrow_mut().set_scheduler(scheduler_id);

        self.workload_queue_watcher
            .borrow_mut()
            .generate_workload(true);

        self.status = RunStatus::Running;
        let start = Instant::now();

        loop {
            if self.abort.is_aborted() {
                self.status = RunStatus::Aborted;
                break;
            }
            if let Some(budget) = self.wall_clock_budget {
                if start.elapsed() > budget {
                    self.abort.abort();
                    self.status = RunStatus::Aborted;
                    break;
                }
            }
            if !self.sim.step() {
                break;
            }
            if let Some(horizon) = self.horizon {
                if self.sim.time() >= horizon {
                    break;
                }
            }
        }

        if self.status != RunStatus::Aborted {
            self.flush_unplaced();
            self.status = RunStatus::Completed;

            let storage = self.shared_info_storage.borrow();
            println!(
                "simulation finished at {:.3}: {} placed, {} rejected of {} requests ({:.3}s wall clock)",
                self.sim.time(),
                storage.placed_count(),
                storage.rejected_count(),
                self.cluster.borrow().expected_execution_count(),
                start.elapsed().as_secs_f64(),
            );
        }

        self.monitoring.borrow_mut().finalize(self.sim.time());
        self.status
    }

    /// Requests without a decision when the run ends (still queued, or cut
    /// off by the horizon) become rejections in the trace.
    fn flush_unplaced(&mut self) {
        let undecided = self.shared_info_storage.borrow().undecided_requests();
        if undecided.is_empty() {
            return;
        }
        let hosts = self.cluster.borrow().get_hosts().len();
        let tenants = self.shared_info_storage.borrow().collections_count();
        let latency = self
            .scheduler
            .as_ref()
            .unwrap()
            .borrow()
            .complexity()
            .decision_latency_ms(hosts, tenants);
        let time = self.sim.time();
        let mut storage = self.shared_info_storage.borrow_mut();
        for execution_id in undecided {
            storage.record_decision(PlacementDecision {
                execution_id,
                outcome: DecisionOutcome::Rejected {
                    reason: RejectReason::Unplaced,
                },
                decision_latency_ms: latency,
                time,
            });
        }
    }

    /// Finalizes the run record. Call after `run` has returned.
    pub fn into_trace(self) -> SimulationTrace {
        let strategy = self
            .scheduler
            .as_ref()
            .map(|s| s.borrow().name())
            .unwrap_or_else(|| "none".to_string());

        let storage = self.shared_info_storage.borrow();
        let cluster = self.cluster.borrow();
        let monitoring = self.monitoring.borrow();

        let total_requests = cluster.expected_execution_count();
        let placed = storage.placed_count();
        let rejected = storage.rejected_count();
        if self.status == RunStatus::Completed {
            assert_eq!(
                placed + rejected,
                total_requests,
                "decision conservation violated"
            );
        }

        let end_time = self.sim.time();
        let makespan = if cluster.running_count() > 0 {
            end_time.max(storage.last_completion_time())
        } else {
            storage.last_completion_time()
        };

        let (queue_sizes, queue_sizes_by_user) = monitoring.queue_size_samples();

        SimulationTrace {
            scenario: self.scenario.clone(),
            strategy,
            seed: self.seed,
            status: self.status,
            total_requests,
            placed,
            rejected,
            decisions: storage.decisions().to_vec(),
            samples: monitoring.utilization_samples().to_vec(),
            hosts: cluster.host_snapshots(),
            dominant_shares: monitoring.dominant_share_series().to_vec(),
            queue_sizes: queue_sizes.to_vec(),
            queue_sizes_by_user: queue_sizes_by_user.clone(),
            energy: monitoring.energy_report(),
            makespan,
            end_time,
        }
    }
}
