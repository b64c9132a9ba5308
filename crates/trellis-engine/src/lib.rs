//! # Trellis Engine
//!
//! The orchestration core proper:
//! - **condition**: the sandboxed guard-expression evaluator
//! - **schedule**: local wall-clock ↔ UTC cron translation
//! - **executor**: the per-run step graph state machine
//! - **scheduler**: minute-granularity due-check loop over active workflows
//! - **store**: memory and file-backed definition/run persistence
//! - **invoker**: the HTTP step invoker and the test mock

pub mod condition;
pub mod executor;
pub mod invoker;
pub mod ledger;
pub mod schedule;
pub mod scheduler;
pub mod store;

pub use condition::evaluate;
pub use executor::{EngineConfig, ExecutionEngine, RunMode};
pub use invoker::{HttpStepInvoker, MockStepInvoker};
pub use ledger::RunLedger;
pub use schedule::{LocalSchedule, ScheduleKind};
pub use scheduler::Scheduler;
pub use store::{FileRunStore, FileWorkflowStore, MemoryRunStore, MemoryWorkflowStore};
