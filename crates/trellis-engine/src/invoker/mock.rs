//! Mock step invoker for tests and local dry runs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use trellis_protocols::error::StepInvocationError;
use trellis_protocols::invoker::{InvocationOutcome, StepInvocation, StepInvoker};

/// Returns pre-configured outcomes keyed by agent ID; agents without a
/// configured outcome echo the invocation back as a success.
pub struct MockStepInvoker {
    outcomes: RwLock<HashMap<String, InvocationOutcome>>,
    invocations: RwLock<Vec<StepInvocation>>,
    delay: RwLock<Option<Duration>>,
}

impl MockStepInvoker {
    pub fn new() -> Self {
        Self {
            outcomes: RwLock::new(HashMap::new()),
            invocations: RwLock::new(Vec::new()),
            delay: RwLock::new(None),
        }
    }

    /// Fix the outcome returned for an agent.
    pub async fn set_outcome(&self, agent_id: &str, outcome: InvocationOutcome) {
        self.outcomes
            .write()
            .await
            .insert(agent_id.to_string(), outcome);
    }

    /// Sleep this long inside every invocation, for cancellation/timeout
    /// tests.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Every invocation seen so far, in order.
    pub async fn invocations(&self) -> Vec<StepInvocation> {
        self.invocations.read().await.clone()
    }
}

impl Default for MockStepInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StepInvoker for MockStepInvoker {
    async fn invoke(
        &self,
        invocation: StepInvocation,
    ) -> Result<InvocationOutcome, StepInvocationError> {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }

        self.invocations.write().await.push(invocation.clone());

        let outcomes = self.outcomes.read().await;
        if let Some(outcome) = outcomes.get(&invocation.agent_id) {
            return Ok(outcome.clone());
        }
        Ok(InvocationOutcome::success(serde_json::json!({
            "agent": invocation.agent_id,
            "instruction": invocation.instruction,
        })))
    }
}
