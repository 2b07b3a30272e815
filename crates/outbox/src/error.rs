use common::{EventId, EventType};
use thiserror::Error;

/// Errors that can occur when interacting with the outbox, ledger or aggregate tables.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The event has already been recorded in the processed-event ledger.
    ///
    /// Consumers treat this as "already handled", not as a failure.
    #[error("Event {0} has already been processed")]
    Conflict(EventId),

    /// An outbox record with the same event id already exists.
    #[error("Outbox record for event {0} already exists")]
    DuplicateOutboxRecord(EventId),

    /// A stored row could not be turned back into a domain value.
    #[error("Invalid row: {0}")]
    InvalidRow(String),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while turning serialized bytes back into a typed event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON for the target event type.
    #[error("Malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload decoded, but carries a different event type tag.
    #[error("Event type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: EventType,
        found: EventType,
    },
}

/// Errors raised while dispatching an outbox record to the transport.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The record payload could not be decoded for its declared type.
    #[error("Serialization error: {0}")]
    Serialization(#[from] DecodeError),

    /// The transport rejected or timed out the publish.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No dispatcher is registered for the record's event type.
    #[error("No dispatcher registered for event type {0}")]
    UnknownEventType(EventType),
}
