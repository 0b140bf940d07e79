use std::collections::{BTreeMap, VecDeque};

use dslab_core::Id;
use rustc_hash::FxHashMap;

use crate::config::sim_config::HostConfig;
use crate::scheduler::{
    ComplexityClass, HostAvailableResources, QueuedExecution, Scheduler, SchedulerContext,
    ShareTracker,
};
use crate::workload_generators::events::{CollectionRequest, ExecutionRequest, ResourceVector};

/// Dominant Resource Fairness: per-tenant FIFO queues served in order of the
/// tenants' current dominant shares (progressive filling). The pass stops as
/// soon as the lowest-share candidate fits nowhere; fairness order is never
/// bypassed. Placing one tenant's request never changes another tenant's
/// dominant share, so no tenant can be envied into a worse position.
pub struct DrfScheduler {
    hosts: Vec<HostConfig>,
    available: FxHashMap<Id, ResourceVector>,
    queues: BTreeMap<Option<String>, VecDeque<QueuedExecution>>,
    shares: ShareTracker,
    collection_users: FxHashMap<u64, Option<String>>,
    placed: FxHashMap<u64, (Id, ResourceVector, Option<String>)>,
}

impl DrfScheduler {
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            available: FxHashMap::default(),
            queues: BTreeMap::new(),
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

    /// Tenant to serve next: lowest dominant share, ties broken by the
    /// earliest queued arrival, then by tenant key.
    fn next_tenant(&self) -> Option<Option<String>> {
        let mut best: Option<(f64, f64, &Option<String>)> = None;
        for (user, queue) in &self.queues {
            let front = match queue.front() {
                Some(front) => front,
                None => continue,
            };
            let share = self.shares.dominant_share(user);
            let candidate = (share, front.arrival, user);
            let better = match &best {
                None => true,
                Some((best_share, best_arrival, _)) => {
                    share < *best_share || (share == *best_share && front.arrival < *best_arrival)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        best.map(|(_, _, user)| user.clone())
    }

    fn first_fit_host(&self, demand: &ResourceVector) -> Option<Id> {
        self.hosts
            .iter()
            .find(|host| demand.fit_into(&self.available[&host.id]))
            .map(|host| host.id)
    }

    fn schedule(&mut self, ctx: &SchedulerContext) {
        loop {
            let user = match self.next_tenant() {
                Some(user) => user,
                None => break,
            };
            let demand = self.queues[&user].front().unwrap().demand;
            let host_id = match self.first_fit_host(&demand) {
                Some(host_id) => host_id,
                // progressive filling: wait for a release instead of
                // serving a better-off tenant out of order
                None => break,
            };
            let execution = self.queues.get_mut(&user).unwrap().pop_front().unwrap();
            self.available.get_mut(&host_id).unwrap().subtract(&execution.demand);
            self.shares.charge(&user, &execution.demand);
            self.placed
                .insert(execution.id, (host_id, execution.demand, user.clone()));
            ctx.schedule(host_id, execution.id);
        }
    }
}

impl Default for DrfScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DrfScheduler {
    fn name(&self) -> String {
        "drf".to_string()
    }

    fn complexity(&self) -> ComplexityClass {
        ComplexityClass::FairnessScan
    }

    fn on_host_added(&mut self, host: HostConfig) {
        self.available.insert(host.id, host.capacity());
        self.shares.extend_total(&host.capacity());
        self.hosts.push(host);
    }

    fn on_collection_request(&mut self, _ctx: &SchedulerContext, request: CollectionRequest) {
        let user = request.user.clone();
        self.collection_users.insert(request.id.unwrap(), user.clone());
        self.shares.register(user.clone());
        self.queues.entry(user).or_default();
    }

    fn on_execution_request(&mut self, ctx: &SchedulerContext, request: ExecutionRequest) {
        let user = self.request_user(&request);
        self.shares.register(user.clone());
        let execution = QueuedExecution::from_request(&request, user.clone());
        self.queues.entry(user).or_default().push_back(execution);
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
