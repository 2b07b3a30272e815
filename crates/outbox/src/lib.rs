pub mod error;
pub mod event;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod relay;
pub mod store;

pub use error::{DecodeError, DispatchError, Result, StoreError};
pub use event::IntegrationEvent;
pub use ledger::DeduplicationLedger;
pub use memory::InMemoryStore;
pub use postgres::{PgAggregate, PostgresStore};
pub use record::{OutboxRecord, ProcessedEventRecord};
pub use relay::{
    DispatchRegistry, MIN_POLL_INTERVAL, OutboxRelay, RecordDispatcher, RelayConfig, RelayReport,
};
pub use store::{Aggregate, AggregateStore, OutboxStore, ProcessedEventStore, UnitOfWork};
