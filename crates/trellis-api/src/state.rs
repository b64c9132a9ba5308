//! Shared application state.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use trellis_engine::{ExecutionEngine, RunLedger};
use trellis_notify::NotifierHub;
use trellis_protocols::invoker::ConnectionLookup;
use trellis_protocols::store::{RunStore, WorkflowStore};

/// State shared by every route handler.
pub struct AppState {
    pub workflow_store: Arc<dyn WorkflowStore>,
    pub run_store: Arc<dyn RunStore>,
    pub engine: Arc<ExecutionEngine>,
    pub ledger: Arc<RunLedger>,
    pub notifier: NotifierHub,
    pub connections: Arc<dyn ConnectionLookup>,
    /// Heartbeat period on the SSE stream.
    pub heartbeat_interval: Duration,
    /// Default timezone for schedule translation when the caller omits one.
    pub default_timezone: String,
}

impl AppState {
    pub fn new(
        workflow_store: Arc<dyn WorkflowStore>,
        run_store: Arc<dyn RunStore>,
        engine: Arc<ExecutionEngine>,
        ledger: Arc<RunLedger>,
        notifier: NotifierHub,
        connections: Arc<dyn ConnectionLookup>,
    ) -> Self {
        Self {
            workflow_store,
            run_store,
            engine,
            ledger,
            notifier,
            connections,
            heartbeat_interval: Duration::from_secs(30),
            default_timezone: "UTC".to_string(),
        }
    }
}

/// Connection lookup backed by a fixed set of connected app slugs.
///
/// Stands in for the real integration-management service, which lives
/// outside the orchestration core.
#[derive(Debug, Default)]
pub struct StaticConnections {
    connected: HashSet<String>,
}

impl StaticConnections {
    /// No apps connected.
    pub fn none() -> Self {
        Self::default()
    }

    /// The given app slugs are connected.
    pub fn with(apps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            connected: apps.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ConnectionLookup for StaticConnections {
    async fn is_connected(&self, app: &str) -> bool {
        self.connected.contains(app)
    }
}
