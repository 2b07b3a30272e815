//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the service
//! tables before each test, so they run serially.
//!
//! ```bash
//! cargo test -p domain --test postgres_integration
//! ```

use std::sync::Arc;

use common::{EventId, EventType, OrderId, PaymentId};
use domain::{
    DomainError, FixedDecider, ORDER_SCHEMA, Order, OrderCreate, OrderService, OrderStatus,
    PAYMENT_SCHEMA, Payment, PaymentCreate, PaymentService, PaymentStatus,
};
use messaging::{OrderCreated, PaymentCompleted};
use outbox::{
    AggregateStore, OutboxRecord, OutboxStore, PostgresStore, ProcessedEventStore, StoreError,
    UnitOfWork,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::<Order>::new(pool.clone(), ORDER_SCHEMA)
                .migrate()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE orders.product_order, orders.outbox, orders.processed_event, \
         payments.payment, payments.outbox, payments.processed_event",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

async fn order_store() -> PostgresStore<Order> {
    PostgresStore::new(get_test_pool().await, ORDER_SCHEMA)
}

#[tokio::test]
#[serial]
async fn create_order_commits_order_and_outbox_record() {
    let store = order_store().await;
    let service = OrderService::new(store.clone());

    let order = service
        .create(OrderCreate::new("Computer", 199.0))
        .await
        .unwrap();

    let found = service.find_by_id(order.id).await.unwrap();
    assert_eq!(found.id, order.id);
    assert_eq!(found.status, OrderStatus::Created);
    assert_eq!(found.product, "Computer");

    let pending = store.find_unprocessed().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, EventType::OrderCreated);
    let event: OrderCreated = pending[0].decode().unwrap();
    assert_eq!(event.order_id, order.id);
}

#[tokio::test]
#[serial]
async fn mark_processed_is_idempotent() {
    let store = order_store().await;
    let service = OrderService::new(store.clone());
    service
        .create(OrderCreate::new("Computer", 199.0))
        .await
        .unwrap();
    let event_id = store.find_unprocessed().await.unwrap()[0].event_id;

    assert!(store.mark_processed(event_id).await.unwrap());
    assert!(!store.mark_processed(event_id).await.unwrap());
    assert!(!store.mark_processed(EventId::new()).await.unwrap());

    assert!(store.find_unprocessed().await.unwrap().is_empty());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders.outbox")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn find_unprocessed_returns_records_in_creation_order() {
    let store = order_store().await;
    let service = OrderService::new(store.clone());

    let mut expected = Vec::new();
    for product in ["a", "b", "c"] {
        let order = service.create(OrderCreate::new(product, 1.0)).await.unwrap();
        expected.push(order.id);
    }

    let order_ids: Vec<_> = store
        .find_unprocessed()
        .await
        .unwrap()
        .iter()
        .map(|r| r.decode::<OrderCreated>().unwrap().order_id)
        .collect();
    assert_eq!(order_ids, expected);
}

#[tokio::test]
#[serial]
async fn duplicate_payment_event_is_applied_once() {
    let store = order_store().await;
    let service = OrderService::new(store.clone());
    let order = service
        .create(OrderCreate::new("Computer", 199.0))
        .await
        .unwrap();
    let event = PaymentCompleted::new(PaymentId::new(), order.id, 199.0);

    service.process_payment_completed(&event).await.unwrap();
    service.process_payment_completed(&event).await.unwrap();

    assert_eq!(
        service.find_by_id(order.id).await.unwrap().status,
        OrderStatus::Completed
    );
    assert!(store.exists(event.id).await.unwrap());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders.processed_event")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn ledger_conflict_rolls_back_the_whole_unit() {
    let store = order_store().await;
    let event_id = EventId::new();
    store
        .commit(UnitOfWork::new().record_processed(event_id))
        .await
        .unwrap();

    let order = Order::place(OrderCreate::new("Computer", 199.0)).unwrap();
    let record =
        OutboxRecord::from_event(&OrderCreated::new(order.id, "Computer", 199.0)).unwrap();
    let result = store
        .commit(
            UnitOfWork::new()
                .save(order.clone())
                .append(record)
                .record_processed(event_id),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Conflict(id)) if id == event_id));
    assert!(store.find_by_id(order.id).await.unwrap().is_none());
    assert!(store.find_unprocessed().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn payment_failed_for_unknown_order_writes_nothing() {
    let store = order_store().await;
    let service = OrderService::new(store.clone());
    let missing = OrderId::new();

    let err = service
        .process_payment_failed(&messaging::PaymentFailed::new(PaymentId::new(), missing))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::OrderNotFound(id) if id == missing));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders.processed_event")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn order_created_creates_payment_and_outcome_record() {
    let store: PostgresStore<Payment> =
        PostgresStore::new(get_test_pool().await, PAYMENT_SCHEMA);
    let service = PaymentService::with_decider(
        store.clone(),
        Arc::new(FixedDecider(PaymentStatus::Completed)),
    );
    let event = OrderCreated::new(OrderId::new(), "Computer", 199.0);

    service.process_order_created(&event).await.unwrap();
    service.process_order_created(&event).await.unwrap();

    let payment = service.find_by_order_id(event.order_id).await.unwrap();
    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(service.find_by_id(payment.id).await.unwrap(), payment);

    let pending = store.find_unprocessed().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, EventType::PaymentCompleted);
}

#[tokio::test]
#[serial]
async fn second_payment_for_same_order_is_a_typed_error() {
    let store: PostgresStore<Payment> =
        PostgresStore::new(get_test_pool().await, PAYMENT_SCHEMA);
    let service = PaymentService::with_decider(
        store.clone(),
        Arc::new(FixedDecider(PaymentStatus::Completed)),
    );
    let order_id = OrderId::new();
    service
        .create(PaymentCreate::new(order_id, PaymentStatus::Completed, 10.0))
        .await
        .unwrap();

    let err = service
        .create(PaymentCreate::new(order_id, PaymentStatus::Failed, 10.0))
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::PaymentAlreadyExists(id) if id == order_id));
    assert_eq!(store.find_unprocessed().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn payment_order_id_is_unique_in_the_table() {
    let store: PostgresStore<Payment> =
        PostgresStore::new(get_test_pool().await, PAYMENT_SCHEMA);
    let order_id = OrderId::new();
    let first = Payment::record(PaymentCreate::new(order_id, PaymentStatus::Completed, 10.0))
        .unwrap();
    let second = Payment::record(PaymentCreate::new(order_id, PaymentStatus::Failed, 10.0))
        .unwrap();
    store.commit(UnitOfWork::new().save(first)).await.unwrap();

    let result = store.commit(UnitOfWork::new().save(second)).await;

    match result {
        Err(StoreError::Database(e)) => {
            assert!(e.as_database_error().is_some_and(|db| db.is_unique_violation()));
        }
        other => panic!("expected a unique violation, got {other:?}"),
    }
}
