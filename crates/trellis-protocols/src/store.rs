//! Persistence traits for workflow definitions and run history.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{WorkflowDefinition, WorkflowRun};

/// Workflow definition persistence.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Save (insert or replace) a definition.
    async fn save(&self, definition: &WorkflowDefinition) -> Result<(), StoreError>;

    /// Load a definition by ID.
    async fn load(&self, id: &str) -> Result<Option<WorkflowDefinition>, StoreError>;

    /// Load all definitions.
    async fn load_all(&self) -> Result<Vec<WorkflowDefinition>, StoreError>;

    /// Delete a definition. Returns whether it existed.
    ///
    /// Deletion removes future scheduling only; run history for the deleted
    /// workflow is retained by the run store.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Active definitions with a schedule trigger, for the scheduler's
    /// due-check.
    async fn list_active_scheduled(&self) -> Result<Vec<WorkflowDefinition>, StoreError>;
}

/// Run history persistence.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Save (insert or replace) a run record.
    async fn save(&self, run: &WorkflowRun) -> Result<(), StoreError>;

    /// Load a run by ID.
    async fn load(&self, id: &Uuid) -> Result<Option<WorkflowRun>, StoreError>;

    /// Runs for a workflow, newest first, capped at `limit`.
    async fn list_for_workflow(
        &self,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, StoreError>;
}
