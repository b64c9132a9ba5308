//! Error taxonomy for the orchestration core.
//!
//! Step-level errors ([`EvaluationError`], [`StepInvocationError`]) are
//! recoverable through a step's failure edge. Run-fatal errors
//! ([`EngineError`]) terminate the run but never the process. Definition and
//! schedule errors are rejected at save/activate time, before any run
//! exists.

mod definition;
mod evaluation;
mod execution;
mod schedule;
mod store;

pub use definition::DefinitionError;
pub use evaluation::EvaluationError;
pub use execution::{EngineError, StepInvocationError};
pub use schedule::ScheduleParseError;
pub use store::{NotifyError, StoreError};
