//! Background workers: one outbox relay per service and one listener per
//! subscribed topic, all sharing a cancellation token.

use std::sync::Arc;

use common::EventType;
use domain::{ORDER_SCHEMA, Order, OrderStore, PAYMENT_SCHEMA, Payment, PaymentStore};
use messaging::{
    EventListener, EventPublisher, InMemoryBroker, OrderCreated, PaymentCompleted, PaymentFailed,
    PublishingDispatcher, Transport,
};
use outbox::{DispatchRegistry, OutboxRelay, OutboxStore, PostgresStore, RelayConfig};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::AppState;
use crate::config::Config;

/// Handle over the spawned relays and listeners.
pub struct RuntimeHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl RuntimeHandle {
    /// Signals every worker to stop after its current unit of work.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Waits for every worker to exit.
    pub async fn join(mut self) {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "background task panicked");
            }
        }
    }
}

/// Connects to PostgreSQL and applies pending migrations.
pub async fn connect_postgres(
    url: &str,
) -> outbox::Result<(PostgresStore<Order>, PostgresStore<Payment>)> {
    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    let orders = PostgresStore::new(pool.clone(), ORDER_SCHEMA);
    orders.migrate().await?;
    tracing::info!("database migrations applied");
    Ok((orders, PostgresStore::new(pool, PAYMENT_SCHEMA)))
}

/// Spawns both relays and all listeners over the given broker.
pub async fn start<O, P>(
    state: &AppState<O, P>,
    broker: &InMemoryBroker,
    config: &Config,
) -> RuntimeHandle
where
    O: OrderStore + OutboxStore,
    P: PaymentStore + OutboxStore,
{
    let token = CancellationToken::new();
    let transport: Arc<dyn Transport> = Arc::new(broker.clone());
    let publisher = |topic: &str| {
        EventPublisher::new(transport.clone(), topic).with_timeout(config.publish_timeout)
    };
    let relay_config = RelayConfig::default().with_poll_interval(config.poll_interval);
    let topics = &config.topics;

    let order_relay = OutboxRelay::new(
        "order-outbox",
        state.orders.store().clone(),
        DispatchRegistry::new().with(
            EventType::OrderCreated,
            PublishingDispatcher::<OrderCreated>::new(publisher(&topics.order_created)),
        ),
    )
    .with_config(relay_config);

    let payment_relay = OutboxRelay::new(
        "payment-outbox",
        state.payments.store().clone(),
        DispatchRegistry::new()
            .with(
                EventType::PaymentCompleted,
                PublishingDispatcher::<PaymentCompleted>::new(publisher(
                    &topics.payment_completed,
                )),
            )
            .with(
                EventType::PaymentFailed,
                PublishingDispatcher::<PaymentFailed>::new(publisher(&topics.payment_failed)),
            ),
    )
    .with_config(relay_config);

    let tasks = vec![
        EventListener::<OrderCreated, _>::new("payment-order-created", state.payments.clone())
            .spawn(broker.subscribe(&topics.order_created).await, token.clone()),
        EventListener::<PaymentCompleted, _>::new("order-payment-completed", state.orders.clone())
            .spawn(broker.subscribe(&topics.payment_completed).await, token.clone()),
        EventListener::<PaymentFailed, _>::new("order-payment-failed", state.orders.clone())
            .spawn(broker.subscribe(&topics.payment_failed).await, token.clone()),
        order_relay.spawn(token.clone()),
        payment_relay.spawn(token.clone()),
    ];

    tracing::info!(workers = tasks.len(), "background workers started");
    RuntimeHandle { token, tasks }
}
