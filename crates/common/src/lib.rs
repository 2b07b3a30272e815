//! Shared types for the order and payment services.

mod event_type;
mod types;

pub use event_type::{EventType, UnknownEventType};
pub use types::{EventId, OrderId, PaymentId};
