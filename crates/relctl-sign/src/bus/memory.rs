use super::{BusMessage, MessageBus, Subscription};
use async_trait::async_trait;
use relctl_core::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

/// In-process bus fanning each message out to every live subscriber
#[derive(Debug, Default)]
pub struct InMemoryBus {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn senders(&self, topic: &str) -> Vec<mpsc::Sender<BusMessage>> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match subscribers.get_mut(topic) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.clone()
            }
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, subscription) = Subscription::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(subscription)
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        let senders = self.senders(&message.topic);
        trace!(
            "Delivering message on {} to {} subscriber(s)",
            message.topic,
            senders.len()
        );
        for tx in senders {
            // A subscriber dropping mid-delivery is not an error for the publisher
            let _ = tx.send(message.clone()).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(topic: &str, n: i64) -> BusMessage {
        BusMessage {
            topic: topic.to_string(),
            priority: None,
            body: json!({ "n": n }),
        }
    }

    #[tokio::test]
    async fn test_fan_out_to_every_subscriber() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("t").await.unwrap();
        let mut b = bus.subscribe("t").await.unwrap();

        bus.publish(message("t", 1)).await.unwrap();

        assert_eq!(a.next().await.unwrap().body["n"], 1);
        assert_eq!(b.next().await.unwrap().body["n"], 1);
    }

    #[tokio::test]
    async fn test_other_topics_are_not_delivered() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("wanted").await.unwrap();

        bus.publish(message("other", 1)).await.unwrap();
        bus.publish(message("wanted", 2)).await.unwrap();

        assert_eq!(sub.next().await.unwrap().body["n"], 2);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = InMemoryBus::new();
        bus.publish(message("nobody", 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = InMemoryBus::new();
        drop(bus.subscribe("t").await.unwrap());
        bus.publish(message("t", 1)).await.unwrap();
        assert!(bus.senders("t").is_empty());
    }
}
