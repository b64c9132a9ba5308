//! The step action invoker seam.
//!
//! Steps delegate their work to an external actor; the engine only sees this
//! trait. Implementations may be network-bound and slow, so the engine wraps
//! every call in a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StepInvocationError;

/// Payload handed to the external step actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInvocation {
    /// Free-text directive from the step definition.
    pub instruction: String,
    /// Which actor should execute it.
    pub agent_id: String,
    /// Accumulated run context (prior step results).
    pub context: serde_json::Value,
}

/// Outcome reported by the step actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationOutcome {
    /// Whether the actor considers the step successful.
    pub success: bool,
    /// Result payload, merged into the run context on success.
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error description for unsuccessful outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationOutcome {
    /// A successful outcome with a result payload.
    pub fn success(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result,
            error: None,
        }
    }

    /// An unsuccessful outcome with an error description.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Executes one step's delegated action.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    /// Invoke the external actor and await its outcome.
    async fn invoke(
        &self,
        invocation: StepInvocation,
    ) -> Result<InvocationOutcome, StepInvocationError>;
}

/// Integration connection lookup.
///
/// Consulted before activating an app-triggered workflow and before test
/// runs that forward trigger output into the first step.
#[async_trait]
pub trait ConnectionLookup: Send + Sync {
    /// Whether the named app integration is connected.
    async fn is_connected(&self, app: &str) -> bool;
}
