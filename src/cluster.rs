use std::{cell::RefCell, rc::Rc};

use dslab_core::{cast, log_debug, Event, EventHandler, Id, SimulationContext};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::config::sim_config::HostConfig;
use crate::host::{ClusterHost, HostSnapshot};
use crate::monitoring::Monitoring;
use crate::scheduler::HostAvailableResources;
use crate::storage::{DecisionOutcome, PlacementDecision, RejectReason, SharedInfoStorage};
use crate::workload_generators::events::ResourceVector;

#[derive(Clone, Serialize)]
pub struct ScheduleExecution {
    pub execution_id: u64,
    pub host_id: Id,
    pub decision_latency_ms: f64,
}

#[derive(Clone, Serialize)]
pub struct RejectExecution {
    pub execution_id: u64,
    pub reason: RejectReason,
    pub decision_latency_ms: f64,
}

#[derive(Clone, Serialize)]
pub struct ExecutionFinished {
    pub execution_id: u64,
    pub hosts: Vec<HostAvailableResources>,
}

#[derive(Clone, Serialize)]
struct ReleaseExecution {
    execution_id: u64,
}

#[derive(Clone, Serialize)]
pub struct AddExpectedExecutionCount {
    pub count: u64,
}

struct RunningExecution {
    host_id: Id,
    demand: ResourceVector,
    user: Option<String>,
}

/// Owns the host fleet. Applies the commit/release effects of scheduler
/// decisions, appends them to the trace and frees capacity when container
/// durations elapse so queued requests can land.
pub(crate) struct Cluster {
    hosts: FxHashMap<Id, ClusterHost>,
    hosts_configs: FxHashMap<Id, HostConfig>,
    host_order: Vec<Id>,

    shared_info_storage: Rc<RefCell<SharedInfoStorage>>,
    monitoring: Rc<RefCell<Monitoring>>,

    scheduler_id: Id,
    ctx: SimulationContext,

    running: FxHashMap<u64, RunningExecution>,
    expected_execution_count: u64,
}

impl Cluster {
    pub(crate) fn new(
        ctx: SimulationContext,
        shared_info_storage: Rc<RefCell<SharedInfoStorage>>,
        monitoring: Rc<RefCell<Monitoring>>,
    ) -> Self {
        Cluster {
            hosts: FxHashMap::default(),
            hosts_configs: FxHashMap::default(),
            host_order: Vec::new(),
            shared_info_storage,
            monitoring,
            scheduler_id: Id::MAX, // must be set later
            ctx,
            running: FxHashMap::default(),
            expected_execution_count: 0,
        }
    }

    pub fn get_id(&self) -> Id {
        self.ctx.id()
    }

    pub fn set_scheduler(&mut self, scheduler_id: Id) {
        self.scheduler_id = scheduler_id;
    }

    pub fn add_host(&mut self, host_config: HostConfig) {
        self.monitoring
            .borrow_mut()
            .add_host(host_config.name.clone(), &host_config);
        self.hosts
            .insert(host_config.id, ClusterHost::new(&host_config));
        self.host_order.push(host_config.id);
        self.hosts_configs.insert(host_config.id, host_config);
    }

    /// Host configs in bootstrap order.
    pub fn get_hosts(&self) -> Vec<HostConfig> {
        self.host_order
            .iter()
            .map(|id| self.hosts_configs[id].clone())
            .collect()
    }

    pub fn add_expected_execution_count(&mut self, count: u64) {
        self.expected_execution_count += count;
    }

    pub fn expected_execution_count(&self) -> u64 {
        self.expected_execution_count
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn host_snapshots(&self) -> Vec<HostSnapshot> {
        self.host_order
            .iter()
            .map(|id| {
                let host = &self.hosts[id];
                HostSnapshot {
                    name: host.name.clone(),
                    capacity: host.capacity,
                    committed: host.committed(),
                    utilization: host.utilization(),
                }
            })
            .collect()
    }

    fn schedule_execution(&mut self, execution_id: u64, host_id: Id, decision_latency_ms: f64) {
        let time = self.ctx.time();
        let (demand, duration, user) = {
            let storage = self.shared_info_storage.borrow();
            let request = storage.get_execution_request(execution_id);
            (request.demand, request.duration, storage.get_execution_user(execution_id))
        };

        let host = self.hosts.get_mut(&host_id).unwrap();
        host.commit(&demand);
        let committed = host.committed();
        let host_name = host.name.clone();

        let mut monitoring = self.monitoring.borrow_mut();
        monitoring.update_host(time, &host_name, &committed);
        if let Some(user) = &user {
            monitoring.charge_user(time, user, &demand);
        }
        monitoring.add_scheduler_queue_size(time, -1, user.clone());
        drop(monitoring);

        self.shared_info_storage
            .borrow_mut()
            .record_decision(PlacementDecision {
                execution_id,
                outcome: DecisionOutcome::Placed { host_id },
                decision_latency_ms,
                time,
            });

        log_debug!(self.ctx, "place execution {} on host {}", execution_id, host_id);

        if let Some(duration) = duration {
            self.ctx.emit_self(ReleaseExecution { execution_id }, duration);
        }
        self.running
            .insert(execution_id, RunningExecution { host_id, demand, user });
    }

    fn reject_execution(&mut self, execution_id: u64, reason: RejectReason, decision_latency_ms: f64) {
        let time = self.ctx.time();
        let user = self
            .shared_info_storage
            .borrow()
            .get_execution_user(execution_id);
        self.monitoring
            .borrow_mut()
            .add_scheduler_queue_size(time, -1, user);
        self.shared_info_storage
            .borrow_mut()
            .record_decision(PlacementDecision {
                execution_id,
                outcome: DecisionOutcome::Rejected { reason },
                decision_latency_ms,
                time,
            });
        log_debug!(self.ctx, "reject execution {}: {:?}", execution_id, reason);
    }

    fn release_execution(&mut self, execution_id: u64) {
        let time = self.ctx.time();
        let execution = self.running.remove(&execution_id).unwrap();

        let host = self.hosts.get_mut(&execution.host_id).unwrap();
        host.release(&execution.demand);
        let committed = host.committed();
        let free = host.free();
        let host_name = host.name.clone();

        let mut monitoring = self.monitoring.borrow_mut();
        monitoring.update_host(time, &host_name, &committed);
        if let Some(user) = &execution.user {
            monitoring.credit_user(time, user, &execution.demand);
        }
        drop(monitoring);

        self.shared_info_storage.borrow_mut().record_completion(time);

        log_debug!(self.ctx, "finish execution {}", execution_id);

        self.ctx.emit_now(
            ExecutionFinished {
                execution_id,
                hosts: vec![HostAvailableResources {
                    host_id: execution.host_id,
                    resources: free,
                }],
            },
            self.scheduler_id,
        );
    }
}

impl EventHandler for Cluster {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ScheduleExecution {
                execution_id,
                host_id,
                decision_latency_ms,
            } => {
                self.schedule_execution(execution_id, host_id, decision_latency_ms);
            }
            RejectExecution {
                execution_id,
                reason,
                decision_latency_ms,
            } => {
                self.reject_execution(execution_id, reason, decision_latency_ms);
            }
            ReleaseExecution { execution_id } => {
                self.release_execution(execution_id);
            }
            AddExpectedExecutionCount { count } => {
                self.add_expected_execution_count(count);
            }
        });
    }
}
