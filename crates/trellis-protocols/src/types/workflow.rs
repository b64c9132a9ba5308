//! Workflow definitions: triggers, steps and the step graph.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DefinitionError;

/// What starts a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Started explicitly by a user or API call.
    Manual,
    /// Started by the scheduler from a UTC cron expression.
    Schedule { cron: String },
    /// Started by an external app event.
    App {
        app_slug: String,
        trigger_key: String,
        #[serde(default)]
        trigger_config: serde_json::Value,
        #[serde(default)]
        parameters: serde_json::Value,
        /// Forward the trigger's output into the first step's context.
        #[serde(default)]
        pass_trigger_output: bool,
    },
}

impl Trigger {
    /// Whether this trigger is driven by the scheduler.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Trigger::Schedule { .. })
    }

    /// Cron expression, if this is a schedule trigger.
    pub fn cron(&self) -> Option<&str> {
        match self {
            Trigger::Schedule { cron } => Some(cron),
            _ => None,
        }
    }

    /// App slug, if this is an app trigger.
    pub fn app_slug(&self) -> Option<&str> {
        match self {
            Trigger::App { app_slug, .. } => Some(app_slug),
            _ => None,
        }
    }
}

/// Step type.
///
/// A single variant today: a directive delegated to an external agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    AgentAction,
}

/// One unit of delegated work in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step ID, unique within the definition.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Step type.
    #[serde(default = "default_step_kind")]
    pub kind: StepKind,
    /// Free-text directive passed to the step invoker.
    pub instruction: String,
    /// Which external actor executes the step.
    pub agent_id: String,
    /// Optional post-condition expression gating the success edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Next step on success. Absent edge terminates the branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_success: Option<String>,
    /// Next step on failure. Absent edge terminates the run as failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<String>,
}

fn default_step_kind() -> StepKind {
    StepKind::AgentAction
}

impl WorkflowStep {
    /// Create a new agent-action step.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        agent_id: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: StepKind::AgentAction,
            instruction: instruction.into(),
            agent_id: agent_id.into(),
            condition: None,
            on_success: None,
            on_failure: None,
        }
    }

    /// Gate the success edge behind a condition expression.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the success edge.
    pub fn on_success(mut self, step_id: impl Into<String>) -> Self {
        self.on_success = Some(step_id.into());
        self
    }

    /// Set the failure edge.
    pub fn on_failure(mut self, step_id: impl Into<String>) -> Self {
        self.on_failure = Some(step_id.into());
        self
    }
}

/// A workflow definition.
///
/// Created in draft state; activation requires a valid trigger and an intact
/// step graph. Updates to steps or trigger bump `version` so run history
/// stays tied to the version it executed against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique ID, immutable after creation.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// What starts a run.
    pub trigger: Trigger,
    /// Ordered steps; the first is the entry step.
    pub steps: Vec<WorkflowStep>,
    /// Eligible for automatic triggering.
    pub is_active: bool,
    /// Incomplete definition; cannot be activated.
    pub is_draft: bool,
    /// Monotonically incremented on every steps/trigger update.
    pub version: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create a new draft definition.
    pub fn new(id: impl Into<String>, name: impl Into<String>, trigger: Trigger) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            trigger,
            steps: Vec::new(),
            is_active: false,
            is_draft: true,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the step list.
    pub fn with_steps(mut self, steps: Vec<WorkflowStep>) -> Self {
        self.steps = steps;
        self
    }

    /// The entry step: first in the list.
    pub fn entry_step(&self) -> Option<&WorkflowStep> {
        self.steps.first()
    }

    /// Look up a step by ID.
    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Bump the version after a steps/trigger update.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Structural integrity checks: unique step IDs and no dangling edges.
    ///
    /// Dangling `on_success`/`on_failure` references are rejected here at
    /// save time. The executor itself remains lenient so documents predating
    /// validation still terminate cleanly.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(DefinitionError::DuplicateStepId {
                    workflow: self.id.clone(),
                    step: step.id.clone(),
                });
            }
        }
        for step in &self.steps {
            for target in [&step.on_success, &step.on_failure].into_iter().flatten() {
                if !seen.contains(target.as_str()) {
                    return Err(DefinitionError::DanglingStepRef {
                        workflow: self.id.clone(),
                        step: step.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Checks required before the definition may be activated.
    ///
    /// Trigger-specific validity (cron parse, integration connection) is
    /// enforced by the activation path that has access to those
    /// collaborators.
    pub fn validate_for_activation(&self) -> Result<(), DefinitionError> {
        self.validate()?;
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps(self.id.clone()));
        }
        Ok(())
    }
}
