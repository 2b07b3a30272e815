use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use outbox::{IntegrationEvent, event};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ListenerError, Notification};

/// Applies an inbound event to a service.
#[async_trait]
pub trait EventHandler<E: IntegrationEvent>: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, event: E) -> Result<(), Self::Error>;
}

#[async_trait]
impl<E, H> EventHandler<E> for Arc<H>
where
    E: IntegrationEvent,
    H: EventHandler<E> + ?Sized,
{
    type Error = H::Error;

    async fn handle(&self, event: E) -> Result<(), Self::Error> {
        (**self).handle(event).await
    }
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// The handler applied the event.
    Handled,
    /// The envelope or payload was malformed; the message was dropped.
    Dropped,
    /// The handler returned an error.
    Failed,
}

/// Unwraps notification envelopes and feeds the inner event to a handler.
pub struct EventListener<E, H> {
    name: &'static str,
    handler: H,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> EventListener<E, H>
where
    E: IntegrationEvent,
    H: EventHandler<E> + 'static,
{
    pub fn new(name: &'static str, handler: H) -> Self {
        Self {
            name,
            handler,
            _event: PhantomData,
        }
    }

    /// Handles one raw envelope.
    ///
    /// Malformed input is logged and dropped without reaching the handler.
    /// Handler errors are logged; neither case stops the listener.
    ///
    /// The listener never retries. A message whose handler failed with a
    /// transient error is only applied again if the transport redelivers it,
    /// and [`InMemoryBroker`](crate::InMemoryBroker) does not.
    pub async fn on_message(&self, raw: &str) -> ListenOutcome {
        metrics::counter!("listener_messages_received_total", "listener" => self.name)
            .increment(1);

        let event = match Self::open(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(listener = self.name, error = %e, "dropping malformed message");
                metrics::counter!("listener_messages_dropped_total", "listener" => self.name)
                    .increment(1);
                return ListenOutcome::Dropped;
            }
        };

        let event_id = event.event_id();
        tracing::info!(listener = self.name, %event_id, event_type = %E::EVENT_TYPE, "received event");

        match self.handler.handle(event).await {
            Ok(()) => ListenOutcome::Handled,
            Err(e) => {
                let err = ListenerError::Handler(e.to_string());
                tracing::error!(listener = self.name, %event_id, error = %err, "failed to handle event");
                ListenOutcome::Failed
            }
        }
    }

    fn open(raw: &str) -> Result<E, ListenerError> {
        tracing::debug!(raw, "received message");
        let notification = Notification::from_json(raw).map_err(ListenerError::Envelope)?;
        let event = event::decode::<E>(notification.message.as_bytes())?;
        Ok(event)
    }

    /// Consumes messages from `rx` until the token is cancelled or the
    /// channel closes.
    pub fn spawn(
        self,
        mut rx: mpsc::UnboundedReceiver<String>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(listener = self.name, "listener started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    message = rx.recv() => match message {
                        Some(raw) => {
                            self.on_message(&raw).await;
                        }
                        None => break,
                    },
                }
            }
            tracing::info!(listener = self.name, "listener stopped");
        })
    }
}
