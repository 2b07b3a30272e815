use std::fmt::Display;
use std::hash::Hash;

use async_trait::async_trait;
use common::EventId;

use crate::{OutboxRecord, ProcessedEventRecord, Result};

/// A domain entity persisted as a whole row by its identity.
pub trait Aggregate: Clone + Send + Sync + 'static {
    /// The identity type of the aggregate.
    type Id: Copy + Eq + Hash + Display + Send + Sync + 'static;

    /// Returns the aggregate type name, used in logs.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identity.
    fn id(&self) -> Self::Id;
}

/// A set of changes committed atomically.
///
/// A unit of work is the only way to stage an outbox record: the record is
/// written in the same transaction as the aggregate change and the ledger
/// entry, or not at all.
#[derive(Debug, Clone)]
pub struct UnitOfWork<A> {
    aggregate: Option<A>,
    outbox: Vec<OutboxRecord>,
    processed: Option<ProcessedEventRecord>,
}

impl<A> Default for UnitOfWork<A> {
    fn default() -> Self {
        Self {
            aggregate: None,
            outbox: Vec::new(),
            processed: None,
        }
    }
}

impl<A> UnitOfWork<A> {
    /// Creates an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an insert-or-update of the aggregate.
    pub fn save(mut self, aggregate: A) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Stages an outbox record.
    pub fn append(mut self, record: OutboxRecord) -> Self {
        self.outbox.push(record);
        self
    }

    /// Stages a processed-event ledger entry for `event_id`.
    ///
    /// The commit fails with [`crate::StoreError::Conflict`] if the ledger
    /// already holds the id, and none of the other changes are applied.
    pub fn record_processed(mut self, event_id: EventId) -> Self {
        self.processed = Some(ProcessedEventRecord::new(event_id));
        self
    }

    /// Returns the staged aggregate, if any.
    pub fn aggregate(&self) -> Option<&A> {
        self.aggregate.as_ref()
    }

    /// Returns the staged outbox records.
    pub fn outbox_records(&self) -> &[OutboxRecord] {
        &self.outbox
    }

    /// Returns the staged ledger entry, if any.
    pub fn processed(&self) -> Option<&ProcessedEventRecord> {
        self.processed.as_ref()
    }

    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.aggregate.is_none() && self.outbox.is_empty() && self.processed.is_none()
    }

    /// Splits the unit into its staged parts.
    pub fn into_parts(
        self,
    ) -> (
        Option<A>,
        Vec<OutboxRecord>,
        Option<ProcessedEventRecord>,
    ) {
        (self.aggregate, self.outbox, self.processed)
    }
}

/// Transactional access to one aggregate type.
#[async_trait]
pub trait AggregateStore<A: Aggregate>: Send + Sync {
    /// Loads an aggregate by id. Returns `None` if it does not exist.
    async fn find_by_id(&self, id: A::Id) -> Result<Option<A>>;

    /// Applies every change in the unit atomically.
    async fn commit(&self, unit: UnitOfWork<A>) -> Result<()>;
}

/// Read and mark access to a service's outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns all records with `processed = false`, oldest first.
    async fn find_unprocessed(&self) -> Result<Vec<OutboxRecord>>;

    /// Marks a record as processed.
    ///
    /// Returns `Ok(true)` if this call flipped the flag. A missing or already
    /// processed record logs a warning and returns `Ok(false)`.
    async fn mark_processed(&self, event_id: EventId) -> Result<bool>;
}

/// Storage for the processed-event ledger.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Returns true if the event id has a ledger entry.
    async fn exists(&self, event_id: EventId) -> Result<bool>;

    /// Inserts a ledger entry.
    ///
    /// Fails with [`crate::StoreError::Conflict`] if the id is already present.
    async fn insert(&self, record: ProcessedEventRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{TestAggregate, TestEvent};

    #[test]
    fn new_unit_is_empty() {
        let unit: UnitOfWork<TestAggregate> = UnitOfWork::new();
        assert!(unit.is_empty());
    }

    #[test]
    fn staged_changes_are_returned_by_into_parts() {
        let aggregate = TestAggregate::new("open");
        let record = OutboxRecord::from_event(&TestEvent::new("hi")).unwrap();
        let event_id = EventId::new();

        let unit = UnitOfWork::new()
            .save(aggregate.clone())
            .append(record.clone())
            .record_processed(event_id);

        assert!(!unit.is_empty());
        assert_eq!(unit.outbox_records().len(), 1);
        assert_eq!(unit.processed().map(|p| p.event_id), Some(event_id));

        let (saved, outbox, processed) = unit.into_parts();
        assert_eq!(saved, Some(aggregate));
        assert_eq!(outbox, vec![record]);
        assert_eq!(processed.map(|p| p.event_id), Some(event_id));
    }
}
