//! Cross-module communication.
//!
//! Modules publish and subscribe to named topics through a
//! [`CommunicationBridge`]. The engine hands the bridge to every
//! implementation factory and binds it into the container, so providers can
//! resolve it as `ProviderKey::of::<SharedBridge>()`.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default number of messages buffered per topic.
const DEFAULT_BUFFER_SIZE: usize = 256;

/// A message on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: String,
    pub payload: Value,
}

/// Topic based publish/subscribe between modules.
pub trait CommunicationBridge: Send + Sync + 'static {
    /// Publishes `payload` on `topic`.
    ///
    /// Returns the number of subscribers that will receive it.
    fn publish(&self, topic: &str, payload: Value) -> usize;

    /// Subscribes to `topic`. Only messages published afterwards are seen.
    fn subscribe(&self, topic: &str) -> Subscription;
}

/// A shared bridge, as handed to implementations and bound in the container.
pub type SharedBridge = Arc<dyn CommunicationBridge>;

/// Receiving end of a topic subscription.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Message>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, receiver: broadcast::Receiver<Message>) -> Self {
        Self {
            topic: topic.into(),
            receiver,
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the topic is closed. Messages lost because this
    /// subscriber fell behind are skipped with a warning.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, missed = n, "Subscriber lagged, missed messages");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next message if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, missed = n, "Subscriber lagged, missed messages");
                }
                Err(_) => return None,
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).finish()
    }
}

/// In-process bridge with one broadcast channel per topic.
pub struct EventBridge {
    topics: DashMap<String, broadcast::Sender<Message>>,
    capacity: usize,
}

impl EventBridge {
    /// Creates a bridge with the default per-topic buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a bridge with a custom per-topic buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Creates a bridge ready to be handed to the engine.
    #[must_use]
    pub fn new_shared() -> SharedBridge {
        Arc::new(Self::new())
    }

    /// Topics that have been published or subscribed to.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.topics.iter().map(|entry| entry.key().clone()).collect()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Message> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationBridge for EventBridge {
    fn publish(&self, topic: &str, payload: Value) -> usize {
        let receivers = self
            .sender(topic)
            .send(Message {
                topic: topic.to_string(),
                payload,
            })
            .unwrap_or_default();
        trace!(topic, receivers, "Published message");
        receivers
    }

    fn subscribe(&self, topic: &str) -> Subscription {
        Subscription::new(topic, self.sender(topic).subscribe())
    }
}

impl fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBridge")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bridge = EventBridge::new();
        let mut first = bridge.subscribe("user.created");
        let mut second = bridge.subscribe("user.created");

        assert_eq!(bridge.publish("user.created", json!({ "id": 1 })), 2);

        let message = first.recv().await.unwrap();
        assert_eq!(message.topic, "user.created");
        assert_eq!(message.payload, json!({ "id": 1 }));
        assert_eq!(second.recv().await.unwrap().payload, json!({ "id": 1 }));
    }

    #[test]
    fn test_topics_are_independent() {
        let bridge = EventBridge::new();
        let mut users = bridge.subscribe("users");
        bridge.publish("posts", json!("ignored"));

        assert!(users.try_recv().is_none());
        assert_eq!(bridge.publish("users", json!("seen")), 1);
        assert_eq!(users.try_recv().unwrap().payload, json!("seen"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bridge = EventBridge::new();
        assert_eq!(bridge.publish("nobody", Value::Null), 0);
        assert_eq!(bridge.topics(), vec!["nobody".to_string()]);
    }

    #[test]
    fn test_lagged_subscriber_skips_lost_messages() {
        let bridge = EventBridge::with_capacity(2);
        let mut subscription = bridge.subscribe("t");
        for i in 0..4 {
            bridge.publish("t", json!(i));
        }
        assert_eq!(subscription.try_recv().unwrap().payload, json!(2));
        assert_eq!(subscription.try_recv().unwrap().payload, json!(3));
        assert!(subscription.try_recv().is_none());
    }
}
