use common::EventId;

use crate::{ProcessedEventRecord, Result, store::ProcessedEventStore};

/// Consumer-side record of which inbound events have been applied.
///
/// Services normally stage their ledger entry inside a [`crate::UnitOfWork`]
/// so it commits with the effect. The ledger is used directly for the
/// pre-check and for events whose only effect is the ledger entry itself.
#[derive(Debug, Clone)]
pub struct DeduplicationLedger<S> {
    store: S,
}

impl<S: ProcessedEventStore> DeduplicationLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns true if the event has already been applied.
    pub async fn is_duplicate(&self, event_id: EventId) -> Result<bool> {
        let duplicate = self.store.exists(event_id).await?;
        if duplicate {
            metrics::counter!("events_deduplicated_total").increment(1);
            tracing::debug!(%event_id, "event already processed");
        }
        Ok(duplicate)
    }

    /// Records the event as applied.
    ///
    /// Fails with [`crate::StoreError::Conflict`] if another delivery got there first.
    pub async fn record(&self, event_id: EventId) -> Result<ProcessedEventRecord> {
        let record = ProcessedEventRecord::new(event_id);
        self.store.insert(record).await?;
        Ok(record)
    }
}
