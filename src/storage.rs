use dslab_core::Id;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::workload_generators::events::{CollectionRequest, ExecutionRequest};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    /// The demand exceeds every host's total capacity; no release can help.
    Infeasible,
    /// Still queued when the run drained.
    Unplaced,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum DecisionOutcome {
    Placed { host_id: Id },
    Rejected { reason: RejectReason },
}

/// One entry of the run trace; produced exactly once per request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlacementDecision {
    pub execution_id: u64,
    pub outcome: DecisionOutcome,
    pub decision_latency_ms: f64,
    pub time: f64,
}

impl PlacementDecision {
    pub fn is_placed(&self) -> bool {
        matches!(self.outcome, DecisionOutcome::Placed { .. })
    }
}

/// Shared per-run ledger: the request registry, tenant lookup and the
/// append-only decision trace. One instance per simulation run.
#[derive(Default)]
pub struct SharedInfoStorage {
    executions_info: FxHashMap<u64, ExecutionRequest>,
    collections: FxHashMap<u64, CollectionRequest>,
    decisions: Vec<PlacementDecision>,
    decided_ids: FxHashSet<u64>,
    placed_count: u64,
    rejected_count: u64,
    last_completion_time: f64,
}

impl SharedInfoStorage {
    pub fn set_execution_request(&mut self, execution_id: u64, request: ExecutionRequest) {
        self.executions_info.insert(execution_id, request);
    }

    pub fn get_execution_request(&self, execution_id: u64) -> ExecutionRequest {
        self.executions_info
            .get(&execution_id)
            .unwrap_or_else(|| panic!("unknown execution {}", execution_id))
            .clone()
    }

    pub fn add_collection(&mut self, collection: CollectionRequest) {
        self.collections.insert(collection.id.unwrap(), collection);
    }

    pub fn get_execution_user(&self, execution_id: u64) -> Option<String> {
        let execution = self.executions_info.get(&execution_id)?;
        let collection_id = execution.collection_id?;
        self.collections.get(&collection_id)?.user.clone()
    }

    pub fn collections_count(&self) -> usize {
        self.collections.len()
    }

    pub fn record_decision(&mut self, decision: PlacementDecision) {
        assert!(
            self.decided_ids.insert(decision.execution_id),
            "execution {} decided twice",
            decision.execution_id
        );
        match decision.outcome {
            DecisionOutcome::Placed { .. } => self.placed_count += 1,
            DecisionOutcome::Rejected { .. } => self.rejected_count += 1,
        }
        self.decisions.push(decision);
    }

    /// Generated requests that never got a decision, in id order. Non-empty
    /// only when a run is cut off by its horizon.
    pub fn undecided_requests(&self) -> Vec<u64> {
        let mut undecided: Vec<u64> = self
            .executions_info
            .keys()
            .filter(|id| !self.decided_ids.contains(id))
            .copied()
            .collect();
        undecided.sort_unstable();
        undecided
    }

    pub fn record_completion(&mut self, time: f64) {
        if time > self.last_completion_time {
            self.last_completion_time = time;
        }
    }

    pub fn decisions(&self) -> &[PlacementDecision] {
        &self.decisions
    }

    pub fn placed_count(&self) -> u64 {
        self.placed_count
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    pub fn last_completion_time(&self) -> f64 {
        self.last_completion_time
    }
}
