//! HTTP step invoker.
//!
//! Posts the invocation payload to the agent host's invoke endpoint and
//! maps the JSON response to an outcome. The client applies its own
//! transport timeout; the engine's per-step timeout wraps the whole call.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use trellis_protocols::error::StepInvocationError;
use trellis_protocols::invoker::{InvocationOutcome, StepInvocation, StepInvoker};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Invokes steps against an external agent host over HTTP.
pub struct HttpStepInvoker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStepInvoker {
    /// Create an invoker for an agent host base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, StepInvocationError> {
        let base = base_url.as_ref().trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StepInvocationError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{base}/api/agents/invoke"),
        })
    }
}

#[async_trait]
impl StepInvoker for HttpStepInvoker {
    async fn invoke(
        &self,
        invocation: StepInvocation,
    ) -> Result<InvocationOutcome, StepInvocationError> {
        debug!(
            "invoking agent {} at {}",
            invocation.agent_id, self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&invocation)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StepInvocationError::Timeout {
                        agent_id: invocation.agent_id.clone(),
                        seconds: DEFAULT_TIMEOUT.as_secs(),
                    }
                } else {
                    StepInvocationError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("agent invoke failed: {} - {}", status, body);
            return Err(StepInvocationError::Actor(format!("{status}: {body}")));
        }

        response
            .json::<InvocationOutcome>()
            .await
            .map_err(|e| StepInvocationError::Actor(format!("malformed outcome payload: {e}")))
    }
}
