use std::collections::VecDeque;

use dslab_core::Id;
use rustc_hash::FxHashMap;

use crate::config::sim_config::HostConfig;
use crate::scheduler::{
    packing_score, ComplexityClass, HostAvailableResources, QueuedExecution, Scheduler,
    SchedulerContext,
};
use crate::workload_generators::events::{CollectionRequest, ExecutionRequest, ResourceVector};

/// Consolidating strategy: requests are served in arrival order (skipping the
/// ones that currently fit nowhere) and land on the feasible host that would
/// be left with the least normalized free capacity. Fills hosts to the edge
/// before spilling over.
pub struct BinPackingScheduler {
    hosts: Vec<HostConfig>,
    available: FxHashMap<Id, ResourceVector>,
    queue: VecDeque<QueuedExecution>,
    placed: FxHashMap<u64, (Id, ResourceVector)>,
}

impl BinPackingScheduler {
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            available: FxHashMap::default(),
            queue: VecDeque::new(),
            placed: FxHashMap::default(),
        }
    }

    fn best_host(&self, demand: &ResourceVector) -> Option<Id> {
        let mut best: Option<(Id, f64)> = None;
        for host in &self.hosts {
            let available = &self.available[&host.id];
            if !demand.fit_into(available) {
                continue;
            }
            let score = packing_score(&host.capacity(), &available.subtracted(demand));
            // strict comparison keeps the first (lowest-id) host on ties
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((host.id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    fn schedule(&mut self, ctx: &SchedulerContext) {
        let mut remaining = VecDeque::new();
        while let Some(execution) = self.queue.pop_front() {
            match self.best_host(&execution.demand) {
                Some(host_id) => {
                    self.available
                        .get_mut(&host_id)
                        .unwrap()
                        .subtract(&execution.demand);
                    self.placed.insert(execution.id, (host_id, execution.demand));
                    ctx.schedule(host_id, execution.id);
                }
                None => remaining.push_back(execution),
            }
        }
        self.queue = remaining;
    }
}

impl Default for BinPackingScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for BinPackingScheduler {
    fn name(&self) -> String {
        "binpacking".to_string()
    }

    fn complexity(&self) -> ComplexityClass {
        ComplexityClass::PackingScan
    }

    fn on_host_added(&mut self, host: HostConfig) {
        self.available.insert(host.id, host.capacity());
        self.hosts.push(host);
    }

    fn on_collection_request(&mut self, _ctx: &SchedulerContext, _request: CollectionRequest) {}

    fn on_execution_request(&mut self, ctx: &SchedulerContext, request: ExecutionRequest) {
        self.queue.push_back(QueuedExecution::from_request(&request, None));
        self.schedule(ctx);
    }

    fn on_execution_finished(
        &mut self,
        ctx: &SchedulerContext,
        execution_id: u64,
        _hosts: Vec<HostAvailableResources>,
    ) {
        if let Some((host_id, demand)) = self.placed.remove(&execution_id) {
            self.available.get_mut(&host_id).unwrap().add(&demand);
        }
        self.schedule(ctx);
    }
}
