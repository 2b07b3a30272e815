pub mod envelope;
pub mod error;
pub mod events;
pub mod listener;
pub mod publisher;
pub mod transport;

pub use envelope::{MessageAttribute, Notification};
pub use error::{ListenerError, TransportError};
pub use events::{OrderCreated, PaymentCompleted, PaymentFailed};
pub use listener::{EventHandler, EventListener, ListenOutcome};
pub use publisher::{DEFAULT_PUBLISH_TIMEOUT, EventPublisher, PublishingDispatcher};
pub use transport::{InMemoryBroker, Transport};

/// Default topic names, one per event type.
pub mod topics {
    pub const ORDER_CREATED: &str = "order-created";
    pub const PAYMENT_COMPLETED: &str = "payment-completed";
    pub const PAYMENT_FAILED: &str = "payment-failed";
}
