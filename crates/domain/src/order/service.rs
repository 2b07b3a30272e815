//! Order service: places orders and applies payment outcomes.

use async_trait::async_trait;
use common::{EventId, OrderId};
use messaging::{EventHandler, OrderCreated, PaymentCompleted, PaymentFailed};
use outbox::{
    AggregateStore, DeduplicationLedger, OutboxRecord, ProcessedEventStore, StoreError, UnitOfWork,
};

use super::{Order, OrderCreate, Transition};
use crate::error::{DomainError, Result};
use crate::payment::PaymentStatus;

/// Storage the order service needs: orders, their outbox and the ledger.
pub trait OrderStore: AggregateStore<Order> + ProcessedEventStore + Clone + 'static {}

impl<S> OrderStore for S where S: AggregateStore<Order> + ProcessedEventStore + Clone + 'static {}

/// Service for managing orders.
///
/// Every state change commits the order, its outbox record and, for inbound
/// events, the ledger entry in a single unit of work.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    ledger: DeduplicationLedger<S>,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            ledger: DeduplicationLedger::new(store.clone()),
            store,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Places an order and stages its `OrderCreated` event.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, input: OrderCreate) -> Result<Order> {
        let order = Order::place(input)?;
        let event = OrderCreated::new(order.id, order.product.clone(), order.amount);

        self.store
            .commit(
                UnitOfWork::new()
                    .save(order.clone())
                    .append(OutboxRecord::from_event(&event)?),
            )
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, event_id = %event.id, "order created");
        Ok(order)
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: OrderId) -> Result<Order> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(DomainError::OrderNotFound(id))
    }

    /// Completes the order the payment belongs to.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, order_id = %event.order_id))]
    pub async fn process_payment_completed(&self, event: &PaymentCompleted) -> Result<()> {
        self.apply_payment(event.id, event.order_id, PaymentStatus::Completed)
            .await
    }

    /// Cancels the order the payment belongs to.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, order_id = %event.order_id))]
    pub async fn process_payment_failed(&self, event: &PaymentFailed) -> Result<()> {
        self.apply_payment(event.id, event.order_id, PaymentStatus::Failed)
            .await
    }

    async fn apply_payment(
        &self,
        event_id: EventId,
        order_id: OrderId,
        outcome: PaymentStatus,
    ) -> Result<()> {
        if self.ledger.is_duplicate(event_id).await? {
            tracing::warn!(%event_id, "event already processed");
            return Ok(());
        }

        let order = self.find_by_id(order_id).await?;

        let mut unit = UnitOfWork::new().record_processed(event_id);
        match order.status.on_payment(outcome) {
            Transition::To(status) => {
                tracing::info!(%order_id, from = %order.status, to = %status, "updating order status");
                unit = unit.save(order.with_status(status));
            }
            Transition::Unchanged => {
                tracing::debug!(%order_id, status = %order.status, "order already in target status");
            }
            Transition::Undefined => {
                // The order keeps its status; the event is still recorded so
                // redelivery does not warn again.
                tracing::warn!(%order_id, status = %order.status, %outcome, "no transition for payment outcome");
            }
        }

        match self.store.commit(unit).await {
            Ok(()) => Ok(()),
            Err(StoreError::Conflict(id)) => {
                metrics::counter!("events_deduplicated_total").increment(1);
                tracing::warn!(event_id = %id, "event processed concurrently, discarding");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S: OrderStore> EventHandler<PaymentCompleted> for OrderService<S> {
    type Error = DomainError;

    async fn handle(&self, event: PaymentCompleted) -> Result<()> {
        self.process_payment_completed(&event).await
    }
}

#[async_trait]
impl<S: OrderStore> EventHandler<PaymentFailed> for OrderService<S> {
    type Error = DomainError;

    async fn handle(&self, event: PaymentFailed) -> Result<()> {
        self.process_payment_failed(&event).await
    }
}
