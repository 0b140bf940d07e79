use thiserror::Error;

use crate::simulation::RunStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// The scenario or cluster configuration is unusable. No events are
    /// processed when this is raised; the run counts as aborted before start.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics were requested for a trace that did not reach `Completed`.
    #[error("cannot aggregate a trace in state {0:?}")]
    IncompleteTrace(RunStatus),
}
