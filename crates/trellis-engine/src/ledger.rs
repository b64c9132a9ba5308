//! Per-workflow run ledger: at-most-one concurrent run enforcement.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Tracks which workflows currently have a live run, and holds each run's
/// cancellation token.
///
/// Scheduled and manual starts both register here, so a workflow can never
/// have two live runs regardless of how they were triggered. Test runs are
/// ad hoc and bypass the ledger.
#[derive(Default)]
pub struct RunLedger {
    active: DashMap<String, CancellationToken>,
}

impl RunLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run for a workflow.
    ///
    /// Returns the run's cancellation token, or `None` when the workflow
    /// already has a live run (the caller suppresses the new start).
    pub fn begin(&self, workflow_id: &str) -> Option<CancellationToken> {
        match self.active.entry(workflow_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let token = CancellationToken::new();
                entry.insert(token.clone());
                Some(token)
            }
        }
    }

    /// Release a workflow's slot once its run is terminal.
    pub fn finish(&self, workflow_id: &str) {
        if self.active.remove(workflow_id).is_some() {
            debug!("released run slot for workflow {}", workflow_id);
        }
    }

    /// Whether a workflow has a live run.
    pub fn is_running(&self, workflow_id: &str) -> bool {
        self.active.contains_key(workflow_id)
    }

    /// Request cancellation of a workflow's live run, if any.
    ///
    /// The engine honors this between steps; an in-flight step invocation
    /// finishes first and its result is discarded.
    pub fn cancel(&self, workflow_id: &str) -> bool {
        match self.active.get(workflow_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}
