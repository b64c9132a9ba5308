//! Step invocation and engine errors.

use thiserror::Error;
use uuid::Uuid;

use super::evaluation::EvaluationError;
use super::store::StoreError;

/// The external step actor failed or timed out.
///
/// Step-level and recoverable: the engine routes it down the step's failure
/// edge when one exists.
#[derive(Debug, Error)]
pub enum StepInvocationError {
    /// The invoker did not respond within the engine's timeout.
    #[error("step invocation timed out after {seconds}s (agent {agent_id})")]
    Timeout { agent_id: String, seconds: u64 },

    /// Transport-level failure reaching the actor.
    #[error("step invocation transport error: {0}")]
    Transport(String),

    /// The actor responded with a failure it could not express as a normal
    /// unsuccessful outcome.
    #[error("step actor error: {0}")]
    Actor(String),
}

/// Run-fatal engine errors.
///
/// These terminate the run with a failed status and are surfaced through the
/// run record and notification stream; they never propagate as panics.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The step graph produced more executions than the safety ceiling:
    /// the cyclic-graph guard.
    #[error("run {run_id} exceeded the step execution limit of {limit}")]
    StepLimitExceeded { run_id: Uuid, limit: usize },

    /// The definition cannot be executed (no steps, unknown workflow).
    #[error("workflow {0} has no executable entry step")]
    NoEntryStep(String),

    /// Condition evaluation failed outside a step's recoverable path.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Persisting the run record failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
