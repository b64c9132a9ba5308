//! Definition integrity errors.

use thiserror::Error;

/// A workflow definition failed validation at save or activation time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// Workflow not found in the store.
    #[error("workflow not found: {0}")]
    NotFound(String),

    /// Two steps share an ID.
    #[error("workflow {workflow}: duplicate step id `{step}`")]
    DuplicateStepId { workflow: String, step: String },

    /// A success/failure edge references a step that does not exist.
    #[error("workflow {workflow}: step `{step}` references unknown step `{target}`")]
    DanglingStepRef {
        workflow: String,
        step: String,
        target: String,
    },

    /// Activation requires at least one step.
    #[error("workflow {0} has no steps")]
    NoSteps(String),

    /// The trigger configuration is invalid for its declared type.
    #[error("workflow {workflow}: invalid trigger: {reason}")]
    InvalidTrigger { workflow: String, reason: String },

    /// The backing app integration is not connected.
    #[error("integration not connected: {0}")]
    IntegrationNotConnected(String),
}
