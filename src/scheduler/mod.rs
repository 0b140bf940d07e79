pub mod bin_packing;
pub mod drf;
pub mod fuse;

use std::collections::BTreeMap;
use std::str::FromStr;

use dslab_core::{cast, Event, EventHandler, Id, SimulationContext};
use serde::{Deserialize, Serialize};

use crate::cluster::{ExecutionFinished, RejectExecution, ScheduleExecution};
use crate::cluster_events::HostAdded;
use crate::config::sim_config::HostConfig;
use crate::scheduler::fuse::FuseWeights;
use crate::storage::RejectReason;
use crate::workload_generators::events::{
    CollectionRequest, CollectionRequestEvent, ExecutionRequest, ExecutionRequestEvent,
    ResourceVector,
};

#[derive(Clone, Serialize, Debug)]
pub struct HostAvailableResources {
    pub host_id: Id,
    pub resources: ResourceVector,
}

/// Complexity class of a strategy's scheduling pass; determines the simulated
/// decision latency. Latency is a function of fleet and tenant counts only,
/// never of wall-clock time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ComplexityClass {
    /// One scored scan over the fleet per decision.
    PackingScan,
    /// A fleet scan plus dominant-share bookkeeping over the tenant set.
    FairnessScan,
}

impl ComplexityClass {
    pub fn decision_latency_ms(&self, hosts: usize, tenants: usize) -> f64 {
        let h = hosts as f64;
        let base = 0.25 + 0.04 * h * (h + 1.).log2();
        match self {
            ComplexityClass::PackingScan => base,
            ComplexityClass::FairnessScan => {
                let t = tenants as f64;
                base + 0.06 * t * (t + 1.).log2()
            }
        }
    }
}

/// Best-fit score: higher for hosts that would be left with less normalized
/// free capacity. Shared by BinPacking and FUSE so that FUSE with
/// `fairness_weight = 0` selects identical hosts.
pub fn packing_score(capacity: &ResourceVector, free_after: &ResourceVector) -> f64 {
    let mut sum = 0.;
    let mut dims = 0;
    for (free, total) in [
        (free_after.cpu, capacity.cpu),
        (free_after.memory, capacity.memory),
        (free_after.storage, capacity.storage),
    ] {
        if total > 0. {
            let ratio = free / total;
            sum += ratio * ratio;
            dims += 1;
        }
    }
    if dims == 0 {
        0.
    } else {
        1. - (sum / dims as f64).sqrt()
    }
}

/// Spread score: higher for hosts that would be left with more free capacity.
pub fn balance_score(capacity: &ResourceVector, free_after: &ResourceVector) -> f64 {
    free_after.mean_share_of(capacity)
}

/// A request waiting in a strategy's queue.
#[derive(Clone, Debug)]
pub struct QueuedExecution {
    pub id: u64,
    pub demand: ResourceVector,
    pub user: Option<String>,
    pub arrival: f64,
}

impl QueuedExecution {
    pub fn from_request(request: &ExecutionRequest, user: Option<String>) -> Self {
        Self {
            id: request.id.unwrap(),
            demand: request.demand,
            user,
            arrival: request.time,
        }
    }
}

/// Per-tenant dominant-share accounting against the total cluster capacity.
/// Tenants are keyed by collection user; requests without a collection fall
/// into the `None` bucket.
#[derive(Default)]
pub struct ShareTracker {
    total: ResourceVector,
    consumed: BTreeMap<Option<String>, ResourceVector>,
}

impl ShareTracker {
    pub fn extend_total(&mut self, capacity: &ResourceVector) {
        self.total.add(capacity);
    }

    pub fn register(&mut self, user: Option<String>) {
        self.consumed.entry(user).or_default();
    }

    pub fn charge(&mut self, user: &Option<String>, demand: &ResourceVector) {
        self.consumed.entry(user.clone()).or_default().add(demand);
    }

    pub fn credit(&mut self, user: &Option<String>, demand: &ResourceVector) {
        self.consumed.entry(user.clone()).or_default().subtract(demand);
    }

    pub fn dominant_share(&self, user: &Option<String>) -> f64 {
        self.consumed
            .get(user)
            .map(|consumed| consumed.max_share_of(&self.total))
            .unwrap_or(0.)
    }

    /// Dominant share the tenant would have after an extra placement.
    pub fn dominant_share_with(&self, user: &Option<String>, demand: &ResourceVector) -> f64 {
        let consumed = self
            .consumed
            .get(user)
            .copied()
            .unwrap_or_default()
            .added(demand);
        consumed.max_share_of(&self.total)
    }

    pub fn min_share_excluding(&self, user: &Option<String>) -> Option<f64> {
        self.consumed
            .iter()
            .filter(|(other, _)| *other != user)
            .map(|(_, consumed)| consumed.max_share_of(&self.total))
            .min_by(|a, b| a.partial_cmp(b).unwrap())
    }
}

/// Decision surface handed to a strategy while an event is dispatched.
/// Placements and rejections go to the cluster as events; the strategy never
/// touches cluster state directly.
pub struct SchedulerContext<'a> {
    ctx: &'a SimulationContext,
    cluster_id: Id,
    decision_latency_ms: f64,
}

impl<'a> SchedulerContext<'a> {
    pub fn new(ctx: &'a SimulationContext, cluster_id: Id, decision_latency_ms: f64) -> Self {
        Self {
            ctx,
            cluster_id,
            decision_latency_ms,
        }
    }

    pub fn time(&self) -> f64 {
        self.ctx.time()
    }

    pub fn schedule(&self, host_id: Id, execution_id: u64) {
        self.ctx.emit_now(
            ScheduleExecution {
                execution_id,
                host_id,
                decision_latency_ms: self.decision_latency_ms,
            },
            self.cluster_id,
        );
    }

    pub fn reject(&self, execution_id: u64, reason: RejectReason) {
        self.ctx.emit_now(
            RejectExecution {
                execution_id,
                reason,
                decision_latency_ms: self.decision_latency_ms,
            },
            self.cluster_id,
        );
    }
}

/// The strategy contract. Implementations keep their own queue and their own
/// mirror of available host resources, updated from the events they receive.
pub trait Scheduler {
    fn name(&self) -> String;
    fn complexity(&self) -> ComplexityClass;
    fn on_host_added(&mut self, host: HostConfig);
    fn on_collection_request(&mut self, ctx: &SchedulerContext, request: CollectionRequest);
    fn on_execution_request(&mut self, ctx: &SchedulerContext, request: ExecutionRequest);
    fn on_execution_finished(
        &mut self,
        ctx: &SchedulerContext,
        execution_id: u64,
        hosts: Vec<HostAvailableResources>,
    );
}

/// Event-facing view of an installed scheduler.
pub trait CustomScheduler {
    fn id(&self) -> Id;
    fn name(&self) -> String;
    fn complexity(&self) -> ComplexityClass;
}

/// Owns a strategy and translates simulation events into trait calls.
/// Requests that no host could ever hold are rejected here, uniformly for
/// every strategy, before the strategy sees them.
pub struct SchedulerInvoker<T: Scheduler> {
    scheduler: T,
    ctx: SimulationContext,
    cluster_id: Id,
    host_capacities: Vec<ResourceVector>,
    tenant_count: usize,
}

impl<T: Scheduler> SchedulerInvoker<T> {
    pub fn new(scheduler: T, ctx: SimulationContext, cluster_id: Id) -> Self {
        Self {
            scheduler,
            ctx,
            cluster_id,
            host_capacities: Vec::new(),
            tenant_count: 0,
        }
    }

    fn decision_latency_ms(&self) -> f64 {
        self.scheduler
            .complexity()
            .decision_latency_ms(self.host_capacities.len(), self.tenant_count)
    }

    fn fits_some_host(&self, demand: &ResourceVector) -> bool {
        self.host_capacities
            .iter()
            .any(|capacity| demand.fit_into(capacity))
    }
}

impl<T: Scheduler> CustomScheduler for SchedulerInvoker<T> {
    fn id(&self) -> Id {
        self.ctx.id()
    }

    fn name(&self) -> String {
        self.scheduler.name()
    }

    fn complexity(&self) -> ComplexityClass {
        self.scheduler.complexity()
    }
}

impl<T: Scheduler> EventHandler for SchedulerInvoker<T> {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            ExecutionRequestEvent { request } => {
                let sctx =
                    SchedulerContext::new(&self.ctx, self.cluster_id, self.decision_latency_ms());
                if !self.fits_some_host(&request.demand) {
                    sctx.reject(request.id.unwrap(), RejectReason::Infeasible);
                } else {
                    self.scheduler.on_execution_request(&sctx, request);
                }
            }
            ExecutionFinished { execution_id, hosts } => {
                let sctx =
                    SchedulerContext::new(&self.ctx, self.cluster_id, self.decision_latency_ms());
                self.scheduler.on_execution_finished(&sctx, execution_id, hosts);
            }
            CollectionRequestEvent { request } => {
                self.tenant_count += 1;
                let sctx =
                    SchedulerContext::new(&self.ctx, self.cluster_id, self.decision_latency_ms());
                self.scheduler.on_collection_request(&sctx, request);
            }
            HostAdded { host } => {
                self.host_capacities.push(host.capacity());
                self.scheduler.on_host_added(host);
            }
        })
    }
}

/// Which strategy to install for a run.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum StrategyKind {
    BinPacking,
    Drf,
    Fuse(FuseWeights),
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::BinPacking => "binpacking",
            StrategyKind::Drf => "drf",
            StrategyKind::Fuse(_) => "fuse",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "binpacking" | "bin-packing" => Ok(StrategyKind::BinPacking),
            "drf" => Ok(StrategyKind::Drf),
            "fuse" => Ok(StrategyKind::Fuse(FuseWeights::default())),
            other => Err(format!("unknown strategy `{}`", other)),
        }
    }
}
