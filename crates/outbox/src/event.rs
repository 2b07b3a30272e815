use chrono::{DateTime, Utc};
use common::{EventId, EventType};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DecodeError;

/// An event that crosses a service boundary.
///
/// Integration events are immutable once constructed. Their serialized form is
/// what gets stored in an outbox record and embedded in a transport envelope.
pub trait IntegrationEvent: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The type tag every instance of this event must carry.
    const EVENT_TYPE: EventType;

    /// Returns the unique id of this event instance.
    fn event_id(&self) -> EventId;

    /// Returns the type tag carried in the payload.
    fn event_type(&self) -> EventType;

    /// Returns when the event was emitted.
    fn emitted_at(&self) -> DateTime<Utc>;
}

/// Serializes an event into its JSON wire form.
pub fn encode<E: IntegrationEvent>(event: &E) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

/// Deserializes an event from its JSON wire form.
///
/// Fails with [`DecodeError::TypeMismatch`] when the payload is well formed but
/// describes a different event type than `E`.
pub fn decode<E: IntegrationEvent>(bytes: &[u8]) -> Result<E, DecodeError> {
    let event: E = serde_json::from_slice(bytes)?;
    if event.event_type() != E::EVENT_TYPE {
        return Err(DecodeError::TypeMismatch {
            expected: E::EVENT_TYPE,
            found: event.event_type(),
        });
    }
    Ok(event)
}
