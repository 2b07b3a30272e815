//! Payment service: records payments for newly created orders.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PaymentId};
use messaging::{EventHandler, OrderCreated, PaymentCompleted, PaymentFailed};
use outbox::{
    AggregateStore, DeduplicationLedger, InMemoryStore, OutboxRecord, ProcessedEventStore,
    StoreError, UnitOfWork,
};

use super::{Payment, PaymentCreate, PaymentDecider, PaymentStatus, RandomDecider};
use crate::error::{DomainError, Result};

/// Lookup of payments by the order they belong to.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_by_order_id(&self, order_id: OrderId) -> outbox::Result<Option<Payment>>;
}

#[async_trait]
impl PaymentRepository for InMemoryStore<Payment> {
    async fn find_by_order_id(&self, order_id: OrderId) -> outbox::Result<Option<Payment>> {
        Ok(self.find_first(|p| p.order_id == order_id).await)
    }
}

/// Storage the payment service needs: payments, their outbox and the ledger.
pub trait PaymentStore:
    AggregateStore<Payment> + ProcessedEventStore + PaymentRepository + Clone + 'static
{
}

impl<S> PaymentStore for S where
    S: AggregateStore<Payment> + ProcessedEventStore + PaymentRepository + Clone + 'static
{
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.is_unique_violation())
}

/// Service for managing payments.
#[derive(Clone)]
pub struct PaymentService<S> {
    store: S,
    ledger: DeduplicationLedger<S>,
    decider: Arc<dyn PaymentDecider>,
}

impl<S: PaymentStore> PaymentService<S> {
    /// Creates a payment service that decides outcomes at random.
    pub fn new(store: S) -> Self {
        Self::with_decider(store, Arc::new(RandomDecider))
    }

    /// Creates a payment service with an explicit outcome decider.
    pub fn with_decider(store: S, decider: Arc<dyn PaymentDecider>) -> Self {
        Self {
            ledger: DeduplicationLedger::new(store.clone()),
            store,
            decider,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records a payment and stages its outcome event.
    ///
    /// Fails with `PaymentAlreadyExists` if the order already has a payment.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, input: PaymentCreate) -> Result<Payment> {
        let payment = Payment::record(input)?;
        if let Some(existing) = self.store.find_by_order_id(payment.order_id).await? {
            tracing::warn!(
                order_id = %payment.order_id,
                payment_id = %existing.id,
                "payment already exists for order"
            );
            return Err(DomainError::PaymentAlreadyExists(payment.order_id));
        }

        let unit = Self::stage(UnitOfWork::new(), &payment)?;
        match self.store.commit(unit).await {
            Ok(()) => {}
            // order_id is unique in the payment table
            Err(StoreError::Database(e)) if is_unique_violation(&e) => {
                return Err(DomainError::PaymentAlreadyExists(payment.order_id));
            }
            Err(e) => return Err(e.into()),
        }

        Self::count_created(&payment);
        Ok(payment)
    }

    /// Loads a payment by id.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: PaymentId) -> Result<Payment> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PaymentNotFound(id))
    }

    /// Loads the payment made for an order.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_order_id(&self, order_id: OrderId) -> Result<Payment> {
        self.store
            .find_by_order_id(order_id)
            .await?
            .ok_or(DomainError::PaymentForOrderNotFound(order_id))
    }

    /// Attempts payment for a newly created order.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id, order_id = %event.order_id))]
    pub async fn process_order_created(&self, event: &OrderCreated) -> Result<()> {
        if self.ledger.is_duplicate(event.id).await? {
            tracing::warn!(event_id = %event.id, "event already processed");
            return Ok(());
        }

        let mut unit = UnitOfWork::new().record_processed(event.id);
        let mut created = None;

        if let Some(existing) = self.store.find_by_order_id(event.order_id).await? {
            tracing::warn!(
                order_id = %event.order_id,
                payment_id = %existing.id,
                "payment already exists for order"
            );
        } else {
            let status = self.decider.decide(event.order_id, event.amount);
            let payment = Payment::record(PaymentCreate::new(event.order_id, status, event.amount))?;
            unit = Self::stage(unit, &payment)?;
            created = Some(payment);
        }

        match self.store.commit(unit).await {
            Ok(()) => {
                if let Some(payment) = &created {
                    Self::count_created(payment);
                }
                Ok(())
            }
            Err(StoreError::Conflict(id)) => {
                metrics::counter!("events_deduplicated_total").increment(1);
                tracing::warn!(event_id = %id, "event processed concurrently, discarding");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stages the payment and the event announcing its outcome.
    fn stage(unit: UnitOfWork<Payment>, payment: &Payment) -> Result<UnitOfWork<Payment>> {
        let record = match payment.status {
            PaymentStatus::Completed => OutboxRecord::from_event(&PaymentCompleted::new(
                payment.id,
                payment.order_id,
                payment.amount,
            ))?,
            PaymentStatus::Failed => {
                OutboxRecord::from_event(&PaymentFailed::new(payment.id, payment.order_id))?
            }
        };
        Ok(unit.save(payment.clone()).append(record))
    }

    fn count_created(payment: &Payment) {
        metrics::counter!("payments_created_total", "status" => payment.status.as_str())
            .increment(1);
        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            status = %payment.status,
            "payment created"
        );
    }
}

#[async_trait]
impl<S: PaymentStore> EventHandler<OrderCreated> for PaymentService<S> {
    type Error = DomainError;

    async fn handle(&self, event: OrderCreated) -> Result<()> {
        self.process_order_created(&event).await
    }
}
