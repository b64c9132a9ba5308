//! Server-Sent Events push stream for live workflow status.
//!
//! Each authenticated subscriber holds one long-lived stream. The first
//! event confirms the connection, workflow status updates follow as the
//! notifier releases them, and a periodic heartbeat lets clients detect
//! silent disconnects and reconnect with backoff. Delivery is
//! at-most-once; clients reconcile against the workflow/run records on
//! reconnect.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
};
use futures::stream::Stream;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use trellis_notify::NotifierHub;
use trellis_protocols::event::{StreamEvent, StreamEventType};

use crate::state::AppState;

/// SSE connection query parameters.
#[derive(Debug, Deserialize)]
pub struct EventsParams {
    /// Subscriber identity; generated when omitted (e.g. reconnection
    /// without one).
    pub subscriber: Option<String>,
}

/// SSE endpoint handler.
///
/// GET /api/workflows/events?subscriber=xxx
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsParams>,
) -> impl IntoResponse {
    let subscriber_id = params
        .subscriber
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    info!("events stream opened for subscriber {}", subscriber_id);

    let stream = event_stream(
        state.notifier.clone(),
        subscriber_id,
        state.heartbeat_interval,
    );

    Sse::new(stream).keep_alive(KeepAlive::new().interval(state.heartbeat_interval))
}

/// Unsubscribes when the stream is dropped (client disconnected).
struct SubscriberGuard {
    hub: NotifierHub,
    id: String,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        debug!("events stream closed for subscriber {}", self.id);
        self.hub.unsubscribe(&self.id);
    }
}

fn event_stream(
    hub: NotifierHub,
    subscriber_id: String,
    heartbeat_interval: std::time::Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut subscription = hub.subscribe(subscriber_id.clone());
        let _guard = SubscriberGuard {
            hub: hub.clone(),
            id: subscriber_id.clone(),
        };

        yield Ok(sse_event(&StreamEvent::connected(
            serde_json::json!({ "subscriberId": subscriber_id }),
        )));

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + heartbeat_interval,
            heartbeat_interval,
        );

        loop {
            tokio::select! {
                received = subscription.receiver.recv() => match received {
                    Some(event) => yield Ok(sse_event(&event)),
                    // The hub dropped this subscriber (fell behind); the
                    // client reconnects and reconciles.
                    None => break,
                },
                _ = heartbeat.tick() => {
                    yield Ok(sse_event(&StreamEvent::heartbeat()));
                }
            }
        }
    }
}

fn sse_event(event: &StreamEvent) -> Event {
    let name = match event.event {
        StreamEventType::WorkflowStatusUpdate => "workflow_status_update",
        StreamEventType::Heartbeat => "heartbeat",
        StreamEventType::Connected => "connected",
    };
    Event::default()
        .event(name)
        .data(serde_json::to_string(event).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;
    use trellis_protocols::event::NotificationType;

    fn data_of(event: &Event) -> String {
        // Event renders as wire text; good enough for assertions.
        format!("{event:?}")
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_starts_with_connected_event() {
        let hub = NotifierHub::new();
        let mut stream = Box::pin(event_stream(
            hub.clone(),
            "user-1".to_string(),
            Duration::from_secs(30),
        ));

        let first = stream.next().await.unwrap().unwrap();
        assert!(data_of(&first).contains("connected"));
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_events_flow_through() {
        let hub = NotifierHub::new();
        let mut stream = Box::pin(event_stream(
            hub.clone(),
            "user-1".to_string(),
            Duration::from_secs(300),
        ));
        let _connected = stream.next().await;

        hub.publish(StreamEvent::status("wf-1", NotificationType::Created));
        let event = stream.next().await.unwrap().unwrap();
        let rendered = data_of(&event);
        assert!(rendered.contains("workflow_status_update"));
        assert!(rendered.contains("wf-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_emitted_on_idle_stream() {
        let hub = NotifierHub::new();
        let mut stream = Box::pin(event_stream(
            hub.clone(),
            "user-1".to_string(),
            Duration::from_secs(30),
        ));
        let _connected = stream.next().await;

        // Nothing published; the next item is a heartbeat after the
        // interval elapses (virtual time advances automatically).
        let event = stream.next().await.unwrap().unwrap();
        assert!(data_of(&event).contains("heartbeat"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unsubscribes() {
        let hub = NotifierHub::new();
        let mut stream = Box::pin(event_stream(
            hub.clone(),
            "user-1".to_string(),
            Duration::from_secs(30),
        ));
        let _connected = stream.next().await;
        assert_eq!(hub.subscriber_count(), 1);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
