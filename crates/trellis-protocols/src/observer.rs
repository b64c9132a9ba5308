//! The run observer seam between the engine and the notifier.

use crate::event::StreamEvent;

/// Receives status events as the engine emits them.
///
/// Implementations must not block: the engine calls this inline between
/// steps, so observers enqueue and return.
pub trait RunObserver: Send + Sync {
    /// Observe one status event.
    fn observe(&self, event: StreamEvent);

    /// The run reached a terminal state; any per-run delivery resources can
    /// be torn down once queued events drain.
    fn run_finished(&self, run_id: uuid::Uuid) {
        let _ = run_id;
    }
}

/// Observer that drops every event. Used for test-mode wiring and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RunObserver for NullObserver {
    fn observe(&self, _event: StreamEvent) {}
}
