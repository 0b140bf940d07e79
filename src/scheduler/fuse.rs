use dslab_core::Id;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::sim_config::HostConfig;
use crate::error::SimulationError;
use crate::scheduler::{
    balance_score, packing_score, ComplexityClass, HostAvailableResources, QueuedExecution,
    Scheduler, SchedulerContext, ShareTracker,
};
use crate::workload_generators::events::{CollectionRequest, ExecutionRequest, ResourceVector};

fn default_max_share_lead() -> f64 {
    0.25
}

/// FUSE configuration surface. The two weights must sum to 1; with
/// `fairness_weight = 0` the strategy degenerates to pure bin-packing, with
/// `packing_weight = 0` tenants are served in pure dominant-share order.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct FuseWeights {
    pub packing_weight: f64,
    pub fairness_weight: f64,
    /// How far a tenant's dominant share may run ahead of the lowest tenant
    /// share before its requests are deferred within a pass.
    #[serde(default = "default_max_share_lead")]
    pub max_share_lead: f64,
}

impl FuseWeights {
    pub fn new(packing_weight: f64, fairness_weight: f64) -> Self {
        Self {
            packing_weight,
            fairness_weight,
            max_share_lead: default_max_share_lead(),
        }
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.packing_weight < 0. || self.fairness_weight < 0. {
            return Err(SimulationError::InvalidConfig(
                "fuse weights must be non-negative".to_string(),
            ));
        }
        if (self.packing_weight + self.fairness_weight - 1.).abs() > 1e-9 {
            return Err(SimulationError::InvalidConfig(
                "fuse weights must sum to 1".to_string(),
            ));
        }
        if self.max_share_lead < 0. {
            return Err(SimulationError::InvalidConfig(
                "max_share_lead must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FuseWeights {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}

/// Hybrid strategy: pending requests are scanned in fairness-weighted
/// dominant-share order (arrival order on ties) without head-of-line
/// blocking, and each request lands on the feasible host with the best
/// weighted combination of consolidation and load balance. Requests whose
/// tenant is too far ahead of the others are deferred, but never starved: a
/// pass that would otherwise place nothing retries them.
pub struct FuseScheduler {
    weights: FuseWeights,
    hosts: Vec<HostConfig>,
    available: FxHashMap<Id, ResourceVector>,
    pending: Vec<QueuedExecution>,
    shares: ShareTracker,
    collection_users: FxHashMap<u64, Option<String>>,
    placed: FxHashMap<u64, (Id, ResourceVector, Option<String>)>,
}

impl FuseScheduler {
    pub fn new(weights: FuseWeights) -> Self {
        Self {
            weights,
            hosts: Vec::new(),
            available: FxHashMap::default(),
            pending: Vec::new(),
            shares: ShareTracker::default(),
            collection_users: FxHashMap::default(),
            placed: FxHashMap::default(),
        }
    }

    fn request_user(&self, request: &ExecutionRequest) -> Option<String> {
        request
            .collection_id
            .and_then(|collection_id| self.collection_users.get(&collection_id).cloned())
            .flatten()
    }

    fn best_host(&self, demand: &ResourceVector) -> Option<Id> {
        let mut best: Option<(Id, f64)> = None;
        for host in &self.hosts {
            let available = &self.available[&host.id];
            if !demand.fit_into(available) {
                continue;
            }
            let free_after = available.subtracted(demand);
            let capacity = host.capacity();
            let score = self.weights.packing_weight * packing_score(&capacity, &free_after)
                + self.weights.fairness_weight * balance_score(&capacity, &free_after);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((host.id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn exceeds_lead(&self, execution: &QueuedExecution) -> bool {
        let share_after = self.shares.dominant_share_with(&execution.user, &execution.demand);
        match self.shares.min_share_excluding(&execution.user) {
            Some(min_other) => share_after - min_other > self.weights.max_share_lead,
            None => false,
        }
    }

    /// Places at most one request; returns whether anything was placed.
    fn try_place(&mut self, ctx: &SchedulerContext, honor_lead: bool) -> bool {
        let mut order: Vec<(f64, f64, u64, usize)> = self
            .pending
            .iter()
            .enumerate()
            .map(|(idx, execution)| {
                let key = self.weights.fairness_weight * self.shares.dominant_share(&execution.user);
                (key, execution.arrival, execution.id, idx)
            })
            .collect();
        order.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap()
                .then(a.1.partial_cmp(&b.1).unwrap())
                .then(a.2.cmp(&b.2))
        });

        for (_, _, _, idx) in order {
            let execution = &self.pending[idx];
            if honor_lead && self.weights.fairness_weight > 0. && self.exceeds_lead(execution) {
                continue;
            }
            let host_id = match self.best_host(&execution.demand) {
                Some(host_id) => host_id,
                None => continue,
            };
            let execution = self.pending.remove(idx);
            self.available.get_mut(&host_id).unwrap().subtract(&execution.demand);
            self.shares.charge(&execution.user, &execution.demand);
            self.placed
                .insert(execution.id, (host_id, execution.demand, execution.user.clone()));
            ctx.schedule(host_id, execution.id);
            return true;
        }
        false
    }

    fn schedule(&mut self, ctx: &SchedulerContext) {
        loop {
            if self.try_place(ctx, true) {
                continue;
            }
            if self.weights.fairness_weight > 0. && self.try_place(ctx, false) {
                continue;
            }
            break;
        }
    }
}

impl Scheduler for FuseScheduler {
    fn name(&self) -> String {
        "fuse".to_string()
    }

    fn complexity(&self) -> ComplexityClass {
        // latency parity with bin-packing is part of the strategy's contract
        ComplexityClass::PackingScan
    }

    fn on_host_added(&mut self, host: HostConfig) {
        self.available.insert(host.id, host.capacity());
        self.shares.extend_total(&host.capacity());
        self.hosts.push(host);
    }

    fn on_collection_request(&mut self, _ctx: &SchedulerContext, request: CollectionRequest) {
        let user = request.user.clone();
        self.collection_users.insert(request.id.unwrap(), user.clone());
        self.shares.register(user);
    }

    fn on_execution_request(&mut self, ctx: &SchedulerContext, request: ExecutionRequest) {
        let user = self.request_user(&request);
        self.shares.register(user.clone());
        self.pending.push(QueuedExecution::from_request(&request, user));
        self.schedule(ctx);
    }

    fn on_execution_finished(
        &mut self,
        ctx: &SchedulerContext,
        execution_id: u64,
        _hosts: Vec<HostAvailableResources>,
    ) {
        if let Some((host_id, demand, user)) = self.placed.remove(&execution_id) {
            self.available.get_mut(&host_id).unwrap().add(&demand);
            self.shares.credit(&user, &demand);
        }
        self.schedule(ctx);
    }
}
