//! Persistence and notification delivery errors.

use thiserror::Error;

/// Workflow/run store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure.
    #[error("store I/O error: {0}")]
    Io(String),

    /// Document could not be (de)serialized.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The per-run queue is gone (run already terminal).
    #[error("no event queue registered for run {0}")]
    UnknownRun(String),

    /// Enqueue failed because the delivery loop has shut down.
    #[error("event queue closed: {0}")]
    QueueClosed(String),
}
