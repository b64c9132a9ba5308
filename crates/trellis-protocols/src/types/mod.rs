//! Core data types for workflow definitions, runs and execution context.

mod context;
mod run;
mod workflow;

pub use context::RunContext;
pub use run::{RunStatus, StepRecord, StepStatus, WorkflowRun};
pub use workflow::{StepKind, Trigger, WorkflowDefinition, WorkflowStep};
