use chrono::{DateTime, Utc};
use common::{EventId, EventType};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::event::{self, IntegrationEvent};

/// A pending or delivered event in a service's outbox.
///
/// Records are written in the same unit of work as the domain mutation they
/// describe. The relay is the only writer after that, and it only ever flips
/// `processed` from `false` to `true`. Records are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Id of the event serialized in `payload`.
    pub event_id: EventId,

    /// Type tag used by the relay to pick a publisher.
    pub event_type: EventType,

    /// The serialized event. Opaque to the store.
    pub payload: Vec<u8>,

    /// When the record was staged.
    pub created_at: DateTime<Utc>,

    /// Whether the record has been observed delivered to the transport.
    pub processed: bool,
}

impl OutboxRecord {
    /// Creates a new unprocessed record from raw parts.
    pub fn new(event_id: EventId, event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            event_id,
            event_type,
            payload,
            created_at: Utc::now(),
            processed: false,
        }
    }

    /// Creates a new unprocessed record by serializing an integration event.
    pub fn from_event<E: IntegrationEvent>(event: &E) -> Result<Self, serde_json::Error> {
        let payload = event::encode(event)?;
        Ok(Self::new(event.event_id(), E::EVENT_TYPE, payload))
    }

    /// Decodes the payload as the event type `E`.
    ///
    /// Fails if the record was staged under a different type tag, or if the
    /// payload does not deserialize into `E`.
    pub fn decode<E: IntegrationEvent>(&self) -> Result<E, DecodeError> {
        if self.event_type != E::EVENT_TYPE {
            return Err(DecodeError::TypeMismatch {
                expected: E::EVENT_TYPE,
                found: self.event_type,
            });
        }
        event::decode(&self.payload)
    }
}

/// Proof that a consumer has applied the effects of an event.
///
/// One row per event id. Existence of a row means the event's side effects
/// must not be applied again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEventRecord {
    pub event_id: EventId,
    pub processed_at: DateTime<Utc>,
}

impl ProcessedEventRecord {
    /// Creates a ledger entry stamped with the current time.
    pub fn new(event_id: EventId) -> Self {
        Self {
            event_id,
            processed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestEvent;

    #[test]
    fn from_event_creates_unprocessed_record() {
        let event = TestEvent::new("hello");
        let record = OutboxRecord::from_event(&event).unwrap();

        assert_eq!(record.event_id, event.id);
        assert_eq!(record.event_type, EventType::OrderCreated);
        assert!(!record.processed);
        assert!(!record.payload.is_empty());
    }

    #[test]
    fn decode_returns_original_event() {
        let event = TestEvent::new("hello");
        let record = OutboxRecord::from_event(&event).unwrap();

        let decoded: TestEvent = record.decode().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_rejects_record_staged_under_another_type() {
        let event = TestEvent::new("hello");
        let mut record = OutboxRecord::from_event(&event).unwrap();
        record.event_type = EventType::PaymentFailed;

        let err = record.decode::<TestEvent>().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch {
                expected: EventType::OrderCreated,
                found: EventType::PaymentFailed
            }
        ));
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let record = OutboxRecord::new(
            EventId::new(),
            EventType::OrderCreated,
            b"invalidPayload".to_vec(),
        );

        let err = record.decode::<TestEvent>().unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn decode_rejects_payload_carrying_another_type_tag() {
        let mut event = TestEvent::new("hello");
        event.event_type = EventType::PaymentCompleted;
        let payload = serde_json::to_vec(&event).unwrap();
        let record = OutboxRecord::new(event.id, EventType::OrderCreated, payload);

        let err = record.decode::<TestEvent>().unwrap_err();
        assert!(matches!(err, DecodeError::TypeMismatch { .. }));
    }
}
