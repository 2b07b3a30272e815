use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::EventId;
use tokio::sync::RwLock;

use crate::{
    Aggregate, OutboxRecord, ProcessedEventRecord, Result, StoreError,
    store::{AggregateStore, OutboxStore, ProcessedEventStore, UnitOfWork},
};

struct State<A: Aggregate> {
    aggregates: HashMap<A::Id, A>,
    outbox: Vec<OutboxRecord>,
    processed: HashMap<EventId, ProcessedEventRecord>,
    fail_on_commit: bool,
}

impl<A: Aggregate> Default for State<A> {
    fn default() -> Self {
        Self {
            aggregates: HashMap::new(),
            outbox: Vec::new(),
            processed: HashMap::new(),
            fail_on_commit: false,
        }
    }
}

/// In-memory store for one service: its aggregates, outbox and ledger.
///
/// All three live behind a single lock so that a [`UnitOfWork`] commit is
/// atomic, mirroring a database transaction.
pub struct InMemoryStore<A: Aggregate> {
    state: Arc<RwLock<State<A>>>,
}

impl<A: Aggregate> Clone for InMemoryStore<A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A: Aggregate> Default for InMemoryStore<A> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl<A: Aggregate> InMemoryStore<A> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail until reset.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.write().await.fail_on_commit = fail;
    }

    /// Returns the first aggregate matching the predicate.
    pub async fn find_first<F>(&self, predicate: F) -> Option<A>
    where
        F: Fn(&A) -> bool + Send,
    {
        let state = self.state.read().await;
        state.aggregates.values().find(|a| predicate(a)).cloned()
    }

    /// Returns the number of stored aggregates.
    pub async fn aggregate_count(&self) -> usize {
        self.state.read().await.aggregates.len()
    }

    /// Returns every outbox record, processed or not, in insertion order.
    pub async fn outbox_records(&self) -> Vec<OutboxRecord> {
        self.state.read().await.outbox.clone()
    }

    /// Returns the number of unprocessed outbox records.
    pub async fn unprocessed_count(&self) -> usize {
        self.state
            .read()
            .await
            .outbox
            .iter()
            .filter(|r| !r.processed)
            .count()
    }

    /// Returns the number of processed-event ledger entries.
    pub async fn processed_count(&self) -> usize {
        self.state.read().await.processed.len()
    }
}

#[async_trait]
impl<A: Aggregate> AggregateStore<A> for InMemoryStore<A> {
    async fn find_by_id(&self, id: A::Id) -> Result<Option<A>> {
        Ok(self.state.read().await.aggregates.get(&id).cloned())
    }

    async fn commit(&self, unit: UnitOfWork<A>) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_commit {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        let (aggregate, outbox, processed) = unit.into_parts();

        // Validate everything before touching state so a failed commit leaves no trace.
        if let Some(entry) = &processed
            && state.processed.contains_key(&entry.event_id)
        {
            return Err(StoreError::Conflict(entry.event_id));
        }
        for (i, record) in outbox.iter().enumerate() {
            let already_stored = state.outbox.iter().any(|r| r.event_id == record.event_id);
            let repeated_in_unit = outbox[..i].iter().any(|r| r.event_id == record.event_id);
            if already_stored || repeated_in_unit {
                return Err(StoreError::DuplicateOutboxRecord(record.event_id));
            }
        }

        if let Some(aggregate) = aggregate {
            state.aggregates.insert(aggregate.id(), aggregate);
        }
        state.outbox.extend(outbox);
        if let Some(entry) = processed {
            state.processed.insert(entry.event_id, entry);
        }

        Ok(())
    }
}

#[async_trait]
impl<A: Aggregate> OutboxStore for InMemoryStore<A> {
    async fn find_unprocessed(&self) -> Result<Vec<OutboxRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<_> = state
            .outbox
            .iter()
            .filter(|r| !r.processed)
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn mark_processed(&self, event_id: EventId) -> Result<bool> {
        let mut state = self.state.write().await;

        match state.outbox.iter_mut().find(|r| r.event_id == event_id) {
            Some(record) if !record.processed => {
                record.processed = true;
                tracing::debug!(%event_id, "marked outbox record as processed");
                Ok(true)
            }
            Some(_) => {
                tracing::warn!(%event_id, "outbox record already processed");
                Ok(false)
            }
            None => {
                tracing::warn!(%event_id, "could not find outbox record");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl<A: Aggregate> ProcessedEventStore for InMemoryStore<A> {
    async fn exists(&self, event_id: EventId) -> Result<bool> {
        Ok(self.state.read().await.processed.contains_key(&event_id))
    }

    async fn insert(&self, record: ProcessedEventRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if state.processed.contains_key(&record.event_id) {
            return Err(StoreError::Conflict(record.event_id));
        }
        state.processed.insert(record.event_id, record);
        Ok(())
    }
}
