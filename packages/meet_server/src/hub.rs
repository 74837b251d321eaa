//! Stamps outbound events with a strictly increasing `seq` and fans them
//! out to every connected client.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use meet_link::ChannelEvent;

use crate::metrics::ServerMetrics;

const BROADCAST_CAPACITY: usize = 256;

pub struct EventHub {
    /// Last `seq` handed out. Held while sending so receivers see events in
    /// `seq` order.
    head: Mutex<u64>,
    tx: broadcast::Sender<Arc<ChannelEvent>>,
    epoch: String,
    metrics: Arc<ServerMetrics>,
}

impl EventHub {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self::with_capacity(BROADCAST_CAPACITY, metrics)
    }

    pub fn with_capacity(capacity: usize, metrics: Arc<ServerMetrics>) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            head: Mutex::new(0),
            tx,
            epoch: uuid::Uuid::new_v4().to_string(),
            metrics,
        }
    }

    /// Identifies this run; clients see `seq` restart when it changes.
    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn head(&self) -> u64 {
        *self.head.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp and broadcast. Returns the assigned `seq`.
    pub fn publish<T: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &T,
    ) -> Result<u64, serde_json::Error> {
        let event = ChannelEvent::from_payload(name, payload)?;
        let mut head = self.head.lock().unwrap_or_else(PoisonError::into_inner);
        *head += 1;
        let seq = *head;
        let receivers = self.tx.send(Arc::new(event.with_seq(seq))).unwrap_or(0);
        self.metrics.event_published();
        trace!(event = name, seq, receivers, "published");
        Ok(seq)
    }

    /// Subscribe and read the head `seq` atomically: every event the
    /// receiver yields has a `seq` above the returned one.
    pub fn subscribe(&self) -> (u64, broadcast::Receiver<Arc<ChannelEvent>>) {
        let head = self.head.lock().unwrap_or_else(PoisonError::into_inner);
        (*head, self.tx.subscribe())
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::broadcast::error::RecvError;

    fn hub() -> EventHub {
        EventHub::new(Arc::new(ServerMetrics::new()))
    }

    #[tokio::test]
    async fn seq_strictly_increases() {
        let hub = hub();
        let (head, mut rx) = hub.subscribe();
        assert_eq!(head, 0);

        for i in 1..=5 {
            assert_eq!(hub.publish("lift_updated", &json!({ "id": i })).unwrap(), i);
        }
        for i in 1..=5 {
            let ev = rx.recv().await.unwrap();
            assert_eq!(ev.seq, Some(i));
            assert_eq!(ev.data["id"], i);
        }
        assert_eq!(hub.head(), 5);
    }

    #[tokio::test]
    async fn late_subscriber_starts_after_head() {
        let hub = hub();
        hub.publish("meet_state_updated", &json!({})).unwrap();
        hub.publish("meet_state_updated", &json!({})).unwrap();

        let (head, mut rx) = hub.subscribe();
        assert_eq!(head, 2);
        hub.publish("lifter_added", &json!({})).unwrap();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.event, "lifter_added");
        assert_eq!(ev.seq, Some(3));
    }

    #[tokio::test]
    async fn publishing_without_receivers_still_advances() {
        let metrics = Arc::new(ServerMetrics::new());
        let hub = EventHub::new(metrics.clone());
        assert_eq!(hub.receiver_count(), 0);
        hub.publish("lift_updated", &json!(null)).unwrap();
        assert_eq!(hub.head(), 1);
        assert_eq!(metrics.snapshot().channel.events_published, 1);
    }

    #[tokio::test]
    async fn slow_receiver_lags() {
        let hub = EventHub::with_capacity(2, Arc::new(ServerMetrics::new()));
        let (_, mut rx) = hub.subscribe();
        for _ in 0..5 {
            hub.publish("lift_updated", &json!({})).unwrap();
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
    }

    #[test]
    fn epochs_differ_per_hub() {
        assert_ne!(hub().epoch(), hub().epoch());
    }
}
