//! Subscriber hub and per-run delivery queues.

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use trellis_protocols::event::StreamEvent;
use trellis_protocols::observer::RunObserver;

/// How long the UI gets to settle after a step completion/failure before
/// the next event for the same run is released.
pub const DEFAULT_SETTLING_DELAY: Duration = Duration::from_millis(2500);

/// Buffered events per subscriber before the connection is considered dead.
const SUBSCRIBER_BUFFER: usize = 256;

/// A live subscriber's receiving end.
pub struct Subscription {
    /// Subscriber ID, for unsubscribing.
    pub id: String,
    /// The event stream.
    pub receiver: mpsc::Receiver<StreamEvent>,
}

/// Fans status events out to subscribers, pacing each run's events through
/// its own FIFO queue.
///
/// Cheap to clone: clones share the same subscriber and queue registries.
///
/// Queue registry discipline: a run's queue is created when its first event
/// arrives and torn down once the run finishes and the queue drains.
/// Queues for different runs never block one another. Delivery is
/// at-most-once: a subscriber that falls behind or disconnects is dropped
/// and reconciles against the store on reconnect.
#[derive(Clone)]
pub struct NotifierHub {
    inner: Arc<Inner>,
}

struct Inner {
    subscribers: DashMap<String, mpsc::Sender<StreamEvent>>,
    runs: DashMap<Uuid, mpsc::UnboundedSender<StreamEvent>>,
    settling_delay: Duration,
}

impl NotifierHub {
    /// Create a hub with the default settling delay.
    pub fn new() -> Self {
        Self::with_settling_delay(DEFAULT_SETTLING_DELAY)
    }

    /// Create a hub with a specific settling delay.
    pub fn with_settling_delay(settling_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: DashMap::new(),
                runs: DashMap::new(),
                settling_delay,
            }),
        }
    }

    /// Register a subscriber and return its stream.
    pub fn subscribe(&self, subscriber_id: impl Into<String>) -> Subscription {
        let id = subscriber_id.into();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        debug!("notifier: subscriber {} connected", id);
        self.inner.subscribers.insert(id.clone(), tx);
        Subscription { id, receiver: rx }
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: &str) {
        if self.inner.subscribers.remove(subscriber_id).is_some() {
            debug!("notifier: subscriber {} disconnected", subscriber_id);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of runs with a live delivery queue.
    pub fn active_run_queues(&self) -> usize {
        self.inner.runs.len()
    }

    /// Publish an event.
    ///
    /// Events carrying a run ID are enqueued on that run's FIFO queue so
    /// the settling delay can pace them; everything else (workflow
    /// lifecycle notifications) broadcasts immediately.
    pub fn publish(&self, event: StreamEvent) {
        match event.run_id {
            Some(run_id) => self.enqueue(run_id, event),
            None => self.broadcast(&event),
        }
    }

    fn enqueue(&self, run_id: Uuid, event: StreamEvent) {
        let sender = self
            .inner
            .runs
            .entry(run_id)
            .or_insert_with(|| self.spawn_delivery_loop(run_id))
            .clone();
        if let Err(mpsc::error::SendError(event)) = sender.send(event) {
            // The loop already drained and exited; deliver the late event
            // directly rather than dropping it.
            warn!("notifier: queue for run {} already closed", run_id);
            self.broadcast(&event);
        }
    }

    /// Start the single-consumer delivery loop for one run's queue.
    fn spawn_delivery_loop(&self, run_id: Uuid) -> mpsc::UnboundedSender<StreamEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<StreamEvent>();
        let hub = self.clone();

        tokio::spawn(async move {
            debug!("notifier: delivery queue for run {} started", run_id);
            while let Some(event) = rx.recv().await {
                let settle = event
                    .notification_type
                    .map(|t| t.needs_settling())
                    .unwrap_or(false);
                hub.broadcast(&event);
                if settle {
                    // Deliberate pacing: the next queued event for this run
                    // is held back so observers see the step land.
                    tokio::time::sleep(hub.inner.settling_delay).await;
                }
            }
            hub.inner.runs.remove(&run_id);
            debug!("notifier: delivery queue for run {} drained", run_id);
        });

        tx
    }

    /// Deliver an event to every subscriber, dropping the ones that are
    /// gone or hopelessly behind.
    fn broadcast(&self, event: &StreamEvent) {
        let mut dead = Vec::new();
        for entry in self.inner.subscribers.iter() {
            if entry.value().try_send(event.clone()).is_err() {
                dead.push(entry.key().clone());
            }
        }
        for id in dead {
            warn!("notifier: dropping unresponsive subscriber {}", id);
            self.inner.subscribers.remove(&id);
        }
    }
}

impl Default for NotifierHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RunObserver for NotifierHub {
    fn observe(&self, event: StreamEvent) {
        self.publish(event);
    }

    fn run_finished(&self, run_id: Uuid) {
        // Closing the sender lets the delivery loop drain what is queued,
        // then exit and unregister itself.
        self.inner.runs.remove(&run_id);
    }
}
