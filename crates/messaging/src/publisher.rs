use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use outbox::{DispatchError, IntegrationEvent, OutboxRecord, RecordDispatcher};

use crate::{Transport, TransportError};

/// Default bound on a single publish call.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes integration events to one topic.
#[derive(Clone)]
pub struct EventPublisher {
    transport: Arc<dyn Transport>,
    topic: String,
    timeout: Duration,
}

impl EventPublisher {
    pub fn new(transport: Arc<dyn Transport>, topic: impl Into<String>) -> Self {
        Self {
            transport,
            topic: topic.into(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serializes and sends an event, failing if the transport does not
    /// acknowledge within the timeout.
    pub async fn publish<E: IntegrationEvent>(&self, event: &E) -> Result<(), TransportError> {
        let message = serde_json::to_string(event)?;
        let publish = self.transport.publish(&self.topic, E::EVENT_TYPE, message);

        match tokio::time::timeout(self.timeout, publish).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(TransportError::Timeout {
                    topic: self.topic.clone(),
                    timeout: self.timeout,
                });
            }
        }

        tracing::info!(
            event_id = %event.event_id(),
            event_type = %E::EVENT_TYPE,
            topic = %self.topic,
            "published event"
        );
        Ok(())
    }
}

/// Relay dispatcher that decodes a record as `E` and publishes it.
pub struct PublishingDispatcher<E> {
    publisher: EventPublisher,
    _event: PhantomData<fn() -> E>,
}

impl<E: IntegrationEvent> PublishingDispatcher<E> {
    pub fn new(publisher: EventPublisher) -> Self {
        Self {
            publisher,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E: IntegrationEvent> RecordDispatcher for PublishingDispatcher<E> {
    async fn dispatch(&self, record: &OutboxRecord) -> Result<(), DispatchError> {
        if record.event_type != E::EVENT_TYPE {
            return Err(DispatchError::UnknownEventType(record.event_type));
        }
        let event: E = record.decode()?;
        self.publisher.publish(&event).await?;
        Ok(())
    }
}
