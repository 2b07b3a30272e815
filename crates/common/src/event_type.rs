use serde::{Deserialize, Serialize};

/// Type tag of an integration event.
///
/// Stored alongside every outbox record and carried as a message attribute on
/// the transport envelope. The relay routes records to publishers by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    OrderCreated,
    PaymentCompleted,
    PaymentFailed,
}

impl EventType {
    /// All known event types.
    pub const ALL: [EventType; 3] = [
        EventType::OrderCreated,
        EventType::PaymentCompleted,
        EventType::PaymentFailed,
    ];

    /// Returns the wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "ORDER_CREATED",
            EventType::PaymentCompleted => "PAYMENT_COMPLETED",
            EventType::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognised event type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventType(pub String);

impl std::fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}

impl std::str::FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}
