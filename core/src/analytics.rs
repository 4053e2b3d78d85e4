//! Analytics event bus
//!
//! Fan-out of structured runtime events to any number of subscribers
//! (typically WebSocket connections). The subscriber list is guarded by a
//! lock that is released before sending, and a failed subscriber is pruned
//! without blocking the others. The most recent payload per event type is
//! kept so a new subscriber immediately receives a snapshot.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Event types pushed over the analytics stream.
pub mod event_types {
    pub const AFFECTIVE_STATE: &str = "affective_state";
    pub const INTEGRITY_STATUS: &str = "integrity_status";
    pub const SELF_CRITICISM: &str = "self_criticism";
    pub const POTENTIAL_PROBLEMS: &str = "potential_problems";
    pub const VALUE_UPDATE: &str = "value_update";
    pub const EXECUTION_TRACE: &str = "execution_trace";
    pub const PROCESS_FEEDBACK: &str = "process_feedback";
    pub const IMPROVEMENT_SUGGESTIONS: &str = "improvement_suggestions";
}

/// A single analytics message: `{ "<event_type>": <payload> }` on the wire.
#[derive(Debug, Clone)]
pub struct AnalyticsEvent {
    pub event_type: String,
    pub payload: Value,
}

impl AnalyticsEvent {
    pub fn to_message(&self) -> Value {
        let mut message = Map::new();
        message.insert(self.event_type.clone(), self.payload.clone());
        Value::Object(message)
    }
}

struct BusInner {
    subscribers: Vec<UnboundedSender<AnalyticsEvent>>,
    latest: Map<String, Value>,
}

pub struct AnalyticsBus {
    inner: Mutex<BusInner>,
}

impl AnalyticsBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                subscribers: Vec::new(),
                latest: Map::new(),
            }),
        }
    }

    /// Register a subscriber. Returns the event receiver and a snapshot of
    /// the most recent payload per event type.
    pub fn subscribe(&self) -> (UnboundedReceiver<AnalyticsEvent>, Value) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.subscribers.push(tx);
        (rx, Value::Object(inner.latest.clone()))
    }

    /// Broadcast an event to all subscribers. The lock is dropped before
    /// any send; closed subscribers are pruned afterwards.
    pub fn publish(&self, event_type: &str, payload: Value) {
        let event = AnalyticsEvent {
            event_type: event_type.to_string(),
            payload: payload.clone(),
        };

        let senders: Vec<UnboundedSender<AnalyticsEvent>> = {
            let mut inner = self.inner.lock();
            inner.latest.insert(event_type.to_string(), payload);
            inner.subscribers.clone()
        };

        if senders.is_empty() {
            return;
        }

        let mut any_closed = false;
        for sender in &senders {
            if sender.send(event.clone()).is_err() {
                any_closed = true;
            }
        }
        debug!(event_type, subscribers = senders.len(), "analytics event published");

        if any_closed {
            let mut inner = self.inner.lock();
            inner.subscribers.retain(|s| !s.is_closed());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for AnalyticsBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscriber_receives_published_events() {
        let bus = AnalyticsBus::new();
        let (mut rx, snapshot) = bus.subscribe();
        assert_eq!(snapshot, json!({}));

        bus.publish(event_types::SELF_CRITICISM, json!("too verbose"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "self_criticism");
        assert_eq!(event.to_message(), json!({"self_criticism": "too verbose"}));
    }

    #[tokio::test]
    async fn test_new_subscriber_gets_latest_snapshot() {
        let bus = AnalyticsBus::new();
        bus.publish(event_types::VALUE_UPDATE, json!({"honesty": 0.9}));
        bus.publish(event_types::VALUE_UPDATE, json!({"honesty": 0.95}));

        let (_rx, snapshot) = bus.subscribe();
        assert_eq!(snapshot, json!({"value_update": {"honesty": 0.95}}));
    }

    #[tokio::test]
    async fn test_closed_subscriber_does_not_block_others() {
        let bus = AnalyticsBus::new();
        let (rx_dead, _snapshot) = bus.subscribe();
        drop(rx_dead);
        let (mut rx_live, _snapshot) = bus.subscribe();

        bus.publish(event_types::EXECUTION_TRACE, json!({"steps": 3}));
        let event = rx_live.recv().await.unwrap();
        assert_eq!(event.event_type, "execution_trace");
        assert_eq!(bus.subscriber_count(), 1);
    }
}
