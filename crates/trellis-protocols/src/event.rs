//! Status events pushed to live observers.
//!
//! Wire format follows the push/subscribe boundary contract: camelCase JSON
//! with a `type` discriminator and, for workflow status updates, a
//! `notificationType` naming what happened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level event class on the push stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    WorkflowStatusUpdate,
    Heartbeat,
    Connected,
}

/// What happened to a workflow or one of its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Activated,
    Deactivated,
    Created,
    Updated,
    Deleted,
    TestStarted,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    StepStarted,
    StepCompleted,
    StepFailed,
}

impl NotificationType {
    /// Step-scoped notifications (carry a step id).
    pub fn is_step(&self) -> bool {
        matches!(
            self,
            NotificationType::StepStarted
                | NotificationType::StepCompleted
                | NotificationType::StepFailed
        )
    }

    /// Notifications that close out a run's event queue.
    pub fn is_run_terminal(&self) -> bool {
        matches!(
            self,
            NotificationType::ExecutionCompleted | NotificationType::ExecutionFailed
        )
    }

    /// Notifications followed by the notifier's settling delay.
    pub fn needs_settling(&self) -> bool {
        matches!(
            self,
            NotificationType::StepCompleted | NotificationType::StepFailed
        )
    }
}

/// One event on the push stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    /// Event class.
    #[serde(rename = "type")]
    pub event: StreamEventType,
    /// Workflow the event concerns (absent for heartbeat/connected).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    /// Run the event belongs to, for execution events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// What happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<NotificationType>,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Step the event concerns, for step notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Display name of that step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    /// Error text, for failure notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Extra type-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StreamEvent {
    /// A workflow status update.
    pub fn status(workflow_id: impl Into<String>, notification_type: NotificationType) -> Self {
        Self {
            event: StreamEventType::WorkflowStatusUpdate,
            workflow_id: Some(workflow_id.into()),
            run_id: None,
            notification_type: Some(notification_type),
            timestamp: Utc::now(),
            step_id: None,
            step_name: None,
            error: None,
            details: None,
        }
    }

    /// A heartbeat keep-alive.
    pub fn heartbeat() -> Self {
        Self {
            event: StreamEventType::Heartbeat,
            workflow_id: None,
            run_id: None,
            notification_type: None,
            timestamp: Utc::now(),
            step_id: None,
            step_name: None,
            error: None,
            details: None,
        }
    }

    /// The initial event confirming a subscriber's stream.
    pub fn connected(details: serde_json::Value) -> Self {
        Self {
            event: StreamEventType::Connected,
            workflow_id: None,
            run_id: None,
            notification_type: None,
            timestamp: Utc::now(),
            step_id: None,
            step_name: None,
            error: None,
            details: Some(details),
        }
    }

    /// Attach a run ID.
    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attach step identity.
    pub fn with_step(mut self, step_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self.step_name = Some(step_name.into());
        self
    }

    /// Attach error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach extra payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
