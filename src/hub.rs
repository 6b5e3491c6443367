//! Broadcast hub fanning live status updates out to SSE subscribers.
//!
//! Subscribers get a bounded queue; a full queue drops the update for that
//! subscriber only. The hub also keeps a warm cache of the latest payload
//! per endpoint so late joiners start from current state.

use crate::store::StatusPayload;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Per-subscriber queue capacity; updates past this are dropped.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 100;

/// One broadcast unit: endpoint name to its latest payload.
pub type Update = HashMap<String, StatusPayload>;

/// Handle returned by [`Hub::register`].
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<Update>,
    /// Latest payload per endpoint at registration time, for late-join
    /// warmup.
    pub warm_cache: HashMap<String, StatusPayload>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    clients: HashMap<u64, mpsc::Sender<Update>>,
    cache: HashMap<String, StatusPayload>,
}

/// Fan-out registry of live subscribers with a warm-start cache.
#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The warm-cache snapshot is taken under the
    /// same lock as enrollment, so no broadcast can slip between the two.
    pub fn register(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let warm_cache = state.cache.clone();
        state.clients.insert(id, tx);
        Subscription {
            id,
            receiver: rx,
            warm_cache,
        }
    }

    /// Remove a subscriber; pending items in its queue are discarded with
    /// the receiver.
    pub fn unregister(&self, id: u64) {
        self.state.lock().unwrap().clients.remove(&id);
    }

    /// Merge the update into the warm cache and enqueue it to every
    /// subscriber. A full queue drops the update for that subscriber; the
    /// next tick republishes fresh state.
    pub fn broadcast(&self, update: Update) {
        let mut state = self.state.lock().unwrap();
        for (name, payload) in &update {
            state.cache.insert(name.clone(), payload.clone());
        }
        for tx in state.clients.values() {
            let _ = tx.try_send(update.clone());
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use crate::store::StatusPayload;

    fn payload(state: &str) -> StatusPayload {
        StatusPayload {
            probe: ProbeResult {
                name: "svc".to_string(),
                state: vec![state.to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn update(name: &str, state: &str) -> Update {
        HashMap::from([(name.to_string(), payload(state))])
    }

    #[tokio::test]
    async fn late_joiner_sees_the_latest_payload_once() {
        let hub = Hub::new();
        hub.broadcast(update("a", "down"));
        hub.broadcast(update("a", "up"));

        let mut sub = hub.register();
        assert_eq!(sub.warm_cache.len(), 1);
        assert_eq!(sub.warm_cache["a"].probe.state, vec!["up"]);
        // Nothing was broadcast since registration.
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcasts_reach_registered_subscribers_in_order() {
        let hub = Hub::new();
        let mut sub = hub.register();

        hub.broadcast(update("a", "up"));
        hub.broadcast(update("a", "down"));

        let first = sub.receiver.recv().await.unwrap();
        let second = sub.receiver.recv().await.unwrap();
        assert_eq!(first["a"].probe.state, vec!["up"]);
        assert_eq!(second["a"].probe.state, vec!["down"]);
    }

    #[tokio::test]
    async fn full_queue_drops_without_stalling_others() {
        let hub = Hub::new();
        let mut slow = hub.register();
        let mut healthy = hub.register();

        // The healthy subscriber drains as it goes; the slow one never does.
        let total = SUBSCRIBER_QUEUE_CAPACITY + 10;
        let mut healthy_received = 0;
        for _ in 0..total {
            hub.broadcast(update("a", "up"));
            if healthy.receiver.try_recv().is_ok() {
                healthy_received += 1;
            }
        }
        assert_eq!(healthy_received, total);

        // The slow subscriber kept only its queue's worth; the overflow was
        // dropped rather than blocking the broadcaster.
        let mut slow_received = 0;
        while slow.receiver.try_recv().is_ok() {
            slow_received += 1;
        }
        assert_eq!(slow_received, SUBSCRIBER_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn unregister_removes_the_subscriber() {
        let hub = Hub::new();
        let sub = hub.register();
        assert_eq!(hub.subscriber_count(), 1);
        hub.unregister(sub.id);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
