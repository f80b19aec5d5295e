use futures::future::BoxFuture;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;
use tokio::sync::broadcast;
use tombola_types::{api::Broadcast, Stake};
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("relay delivery failed: {0}")]
pub struct RelayError(pub String);

/// Outbound delivery of events to something outside the process.
pub trait Relay: Send + Sync + 'static {
    fn deliver(&self, stake: Stake, event: Broadcast) -> BoxFuture<'static, Result<(), RelayError>>;
}

/// Per-stake fan-out of lifecycle events.
#[derive(Clone)]
pub struct Hub {
    topics: Arc<Mutex<HashMap<Stake, broadcast::Sender<Broadcast>>>>,
    capacity: usize,
    relay: Option<Arc<dyn Relay>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
            relay: None,
        }
    }

    pub fn with_relay(mut self, relay: Arc<dyn Relay>) -> Self {
        self.relay = Some(relay);
        self
    }

    fn sender(&self, stake: Stake) -> broadcast::Sender<Broadcast> {
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(stake)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, stake: Stake) -> broadcast::Receiver<Broadcast> {
        self.sender(stake).subscribe()
    }

    pub fn subscribers(&self, stake: Stake) -> usize {
        self.sender(stake).receiver_count()
    }

    /// Best-effort delivery; returns how many local subscribers got the event.
    pub fn publish(&self, stake: Stake, event: Broadcast) -> usize {
        let kind = event.name();
        if let Some(relay) = &self.relay {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let delivery = relay.deliver(stake, event.clone());
                    handle.spawn(async move {
                        if let Err(e) = delivery.await {
                            warn!(stake, kind, error = %e, "relay dropped event");
                        }
                    });
                }
                Err(_) => warn!(stake, kind, "no runtime for relay"),
            }
        }
        match self.sender(stake).send(event) {
            Ok(count) => {
                debug!(stake, kind, count, "broadcast event");
                count
            }
            Err(_) => {
                debug!(stake, kind, "Failed to broadcast event (no subscribers)");
                0
            }
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<(Stake, Broadcast)>>,
    }

    impl Relay for Collect {
        fn deliver(
            &self,
            stake: Stake,
            event: Broadcast,
        ) -> BoxFuture<'static, Result<(), RelayError>> {
            self.seen.lock().unwrap().push((stake, event));
            async { Err(RelayError("offline".into())) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_topics_are_per_stake() {
        let hub = Hub::new(16);
        let mut ten = hub.subscribe(10);
        let mut twenty = hub.subscribe(20);

        assert_eq!(hub.publish(10, Broadcast::Finished { game_id: 1 }), 1);
        assert_eq!(ten.recv().await.unwrap(), Broadcast::Finished { game_id: 1 });
        assert!(twenty.try_recv().is_err());
        assert_eq!(hub.subscribers(20), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = Hub::new(16);
        assert_eq!(hub.publish(10, Broadcast::Restarted { game_id: 2 }), 0);
    }

    #[tokio::test]
    async fn test_relay_failure_is_swallowed() {
        let relay = Arc::new(Collect::default());
        let hub = Hub::new(16).with_relay(relay.clone());
        let mut rx = hub.subscribe(5);

        hub.publish(5, Broadcast::Finished { game_id: 3 });
        assert_eq!(rx.recv().await.unwrap(), Broadcast::Finished { game_id: 3 });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let seen = relay.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(5, Broadcast::Finished { game_id: 3 })]);
    }
}
