use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EventType;
use tokio::sync::{RwLock, mpsc};

use crate::{Notification, TransportError};

/// A publish/subscribe message transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a serialized event to every subscriber of `topic`.
    async fn publish(
        &self,
        topic: &str,
        event_type: EventType,
        message: String,
    ) -> Result<(), TransportError>;
}

#[derive(Default)]
struct BrokerState {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<String>>>,
    published: Vec<Notification>,
    fail_on_publish: bool,
}

/// In-process topic broker.
///
/// Every publish is wrapped in a [`Notification`] and pushed to all current
/// subscribers of the topic as a raw JSON string, the same shape a queue
/// subscription would receive.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<BrokerState>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to a topic, returning the stream of raw envelopes.
    pub async fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .write()
            .await
            .subscribers
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Returns every notification published so far.
    pub async fn published(&self) -> Vec<Notification> {
        self.state.read().await.published.clone()
    }

    /// Returns the notifications published to `topic`.
    pub async fn published_to(&self, topic: &str) -> Vec<Notification> {
        self.state
            .read()
            .await
            .published
            .iter()
            .filter(|n| n.topic_arn == topic)
            .cloned()
            .collect()
    }

    /// Makes every subsequent publish fail until reset.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }
}

#[async_trait]
impl Transport for InMemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        event_type: EventType,
        message: String,
    ) -> Result<(), TransportError> {
        let mut state = self.state.write().await;

        if state.fail_on_publish {
            return Err(TransportError::Unavailable(format!(
                "broker rejected publish to {topic}"
            )));
        }

        let notification = Notification::wrap(topic, event_type, message);
        let raw = notification.to_json()?;

        if let Some(subscribers) = state.subscribers.get_mut(topic) {
            subscribers.retain(|tx| tx.send(raw.clone()).is_ok());
        }
        state.published.push(notification);

        Ok(())
    }
}
