//! Run records: one execution instance of a workflow definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Per-step status within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-step execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step ID from the definition.
    pub step_id: String,
    /// Current status.
    pub status: StepStatus,
    /// Result payload from the invoker, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the step started running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the step finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// Create a pending record for a step.
    pub fn new(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the step running.
    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark the step completed with its result.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    /// Mark the step failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// One execution instance of a workflow definition at a specific version.
///
/// Owned exclusively by the execution engine while live; becomes immutable
/// history once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Run ID.
    pub id: Uuid,
    /// Workflow this run executes.
    pub workflow_id: String,
    /// Definition version captured at start.
    pub workflow_version: u64,
    /// Current status.
    pub status: RunStatus,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, once terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// The step currently (or last) executing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    /// Per-step records in execution order.
    pub steps: Vec<StepRecord>,
    /// Run-level error, for failed runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRun {
    /// Create a new pending run for a workflow at a version.
    pub fn new(workflow_id: impl Into<String>, workflow_version: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id: workflow_id.into(),
            workflow_version,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            current_step_id: None,
            steps: Vec::new(),
            error: None,
        }
    }

    /// Mark the run running.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Utc::now();
    }

    /// Mark the run completed.
    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run cancelled.
    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Append a record for a step about to execute and return its index.
    pub fn push_step(&mut self, step_id: impl Into<String>) -> usize {
        self.steps.push(StepRecord::new(step_id));
        self.steps.len() - 1
    }

    /// The record for the most recently pushed step.
    pub fn last_step_mut(&mut self) -> Option<&mut StepRecord> {
        self.steps.last_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let mut run = WorkflowRun::new("wf-1", 3);
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.workflow_version, 3);

        run.start();
        assert_eq!(run.status, RunStatus::Running);
        assert!(!run.status.is_terminal());

        run.complete();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.status.is_terminal());
        assert!(run.completed_at.is_some());
    }

    #[test]
    fn test_step_record_failure() {
        let mut record = StepRecord::new("s1");
        record.start();
        assert_eq!(record.status, StepStatus::Running);

        record.fail("agent unreachable");
        assert_eq!(record.status, StepStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("agent unreachable"));
    }

    #[test]
    fn test_push_step_tracks_order() {
        let mut run = WorkflowRun::new("wf-1", 1);
        run.push_step("a");
        run.push_step("b");
        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].step_id, "a");
        assert_eq!(run.last_step_mut().unwrap().step_id, "b");
    }

    #[test]
    fn test_cancelled_is_terminal() {
        let mut run = WorkflowRun::new("wf-1", 1);
        run.start();
        run.cancel();
        assert!(run.status.is_terminal());
    }
}
