//! # Trellis Protocols
//!
//! Shared contracts for the trellis workflow orchestration core:
//! - **Types**: workflow definitions, step graphs, runs, execution context
//! - **Events**: status events pushed to live observers
//! - **Errors**: the error taxonomy every crate folds into
//! - **Traits**: the seams to external collaborators (step invoker,
//!   integration connection lookup, persistence stores, run observer)
//!
//! This crate has no runtime machinery of its own; the engine, notifier and
//! API crates all depend on it and never on each other's internals.

pub mod error;
pub mod event;
pub mod invoker;
pub mod observer;
pub mod store;
pub mod types;

pub use error::{
    DefinitionError, EngineError, EvaluationError, NotifyError, ScheduleParseError,
    StepInvocationError, StoreError,
};
pub use event::{NotificationType, StreamEvent, StreamEventType};
pub use invoker::{ConnectionLookup, InvocationOutcome, StepInvocation, StepInvoker};
pub use observer::{NullObserver, RunObserver};
pub use store::{RunStore, WorkflowStore};
pub use types::{
    RunContext, RunStatus, StepKind, StepRecord, StepStatus, Trigger, WorkflowDefinition,
    WorkflowRun, WorkflowStep,
};
