use std::time::Duration;

use outbox::{DecodeError, DispatchError};
use thiserror::Error;

/// Errors raised by a transport while publishing.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is unreachable or refused the message.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The publish did not complete within the configured timeout.
    #[error("Publish to {topic} timed out after {timeout:?}")]
    Timeout { topic: String, timeout: Duration },

    /// The event or its envelope could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        DispatchError::Transport(err.to_string())
    }
}

/// Errors raised while turning an inbound message into a handled event.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The raw message is not a valid notification envelope.
    #[error("Malformed envelope: {0}")]
    Envelope(serde_json::Error),

    /// The envelope's message does not decode into the expected event.
    #[error("Malformed payload: {0}")]
    Payload(#[from] DecodeError),

    /// The handler rejected the event.
    #[error("Handler error: {0}")]
    Handler(String),
}
