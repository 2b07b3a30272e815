use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::EventType;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{DispatchError, OutboxRecord, Result, store::OutboxStore};

/// Sends one outbox record to the transport.
///
/// Implementations decode the payload for the record's type and publish it.
#[async_trait]
pub trait RecordDispatcher: Send + Sync {
    async fn dispatch(&self, record: &OutboxRecord) -> std::result::Result<(), DispatchError>;
}

/// Maps each event type tag to the dispatcher that publishes it.
#[derive(Clone, Default)]
pub struct DispatchRegistry {
    dispatchers: HashMap<EventType, Arc<dyn RecordDispatcher>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a dispatcher, replacing any previous one for the same type.
    pub fn register<D>(&mut self, event_type: EventType, dispatcher: D)
    where
        D: RecordDispatcher + 'static,
    {
        self.dispatchers.insert(event_type, Arc::new(dispatcher));
    }

    /// Builder form of [`DispatchRegistry::register`].
    pub fn with<D>(mut self, event_type: EventType, dispatcher: D) -> Self
    where
        D: RecordDispatcher + 'static,
    {
        self.register(event_type, dispatcher);
        self
    }

    pub fn get(&self, event_type: EventType) -> Option<&Arc<dyn RecordDispatcher>> {
        self.dispatchers.get(&event_type)
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }
}

/// Relay scheduling settings.
#[derive(Debug, Clone, Copy)]
pub struct RelayConfig {
    /// Delay between the start of two passes.
    pub poll_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Shortest delay the ticker accepts; zero would make `interval` panic.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl RelayConfig {
    /// Sets the poll interval, clamped to at least [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }
}

/// Outcome of a single relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub scanned: usize,
    pub published: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Publishes unprocessed outbox records and marks them as processed.
///
/// Each pass reads every unprocessed record, publishes it through the
/// dispatcher registered for its type and then marks it. Publish happens
/// outside any transaction. A record whose publish or mark fails stays
/// unprocessed and is picked up again on the next pass, which is what makes
/// delivery at-least-once.
pub struct OutboxRelay<S> {
    name: &'static str,
    store: S,
    registry: DispatchRegistry,
    config: RelayConfig,
}

impl<S: OutboxStore + 'static> OutboxRelay<S> {
    pub fn new(name: &'static str, store: S, registry: DispatchRegistry) -> Self {
        Self {
            name,
            store,
            registry,
            config: RelayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs one scan, dispatch and mark pass.
    ///
    /// Only a failure to read the outbox is returned as an error. Failures on
    /// individual records are logged and counted in the report.
    #[tracing::instrument(skip(self), fields(relay = self.name))]
    pub async fn run_once(&self) -> Result<RelayReport> {
        let started = Instant::now();
        let records = self.store.find_unprocessed().await?;

        let mut report = RelayReport {
            scanned: records.len(),
            ..RelayReport::default()
        };
        if records.is_empty() {
            return Ok(report);
        }

        tracing::debug!(count = records.len(), "dispatching unprocessed outbox records");

        for record in &records {
            let event_id = record.event_id;
            let event_type = record.event_type;

            let Some(dispatcher) = self.registry.get(event_type) else {
                tracing::warn!(%event_id, %event_type, "no dispatcher registered, skipping record");
                metrics::counter!("outbox_records_skipped_total", "relay" => self.name)
                    .increment(1);
                report.skipped += 1;
                continue;
            };

            if let Err(e) = dispatcher.dispatch(record).await {
                tracing::error!(%event_id, %event_type, error = %e, "failed to publish outbox record");
                metrics::counter!("outbox_records_failed_total", "relay" => self.name)
                    .increment(1);
                report.failed += 1;
                continue;
            }

            match self.store.mark_processed(event_id).await {
                Ok(_) => {
                    tracing::info!(%event_id, %event_type, "published outbox record");
                    metrics::counter!("outbox_records_published_total", "relay" => self.name)
                        .increment(1);
                    report.published += 1;
                }
                Err(e) => {
                    // Published but not marked: it will be sent again next pass.
                    tracing::error!(%event_id, %event_type, error = %e, "failed to mark outbox record");
                    metrics::counter!("outbox_records_failed_total", "relay" => self.name)
                        .increment(1);
                    report.failed += 1;
                }
            }
        }

        metrics::histogram!("outbox_relay_pass_duration_seconds", "relay" => self.name)
            .record(started.elapsed().as_secs_f64());

        Ok(report)
    }

    /// Runs passes on a fixed-delay schedule until the token is cancelled.
    ///
    /// A pass in flight when the token fires runs to completion.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                relay = self.name,
                poll_interval_ms = self.config.poll_interval.as_millis() as u64,
                "outbox relay started"
            );

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(relay = self.name, error = %e, "outbox relay pass failed");
                        }
                    }
                }
            }

            tracing::info!(relay = self.name, "outbox relay stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use common::EventId;

    use super::*;
    use crate::{
        InMemoryStore, StoreError, UnitOfWork,
        fixtures::{TestAggregate, TestEvent},
        store::AggregateStore,
    };

    /// Records every dispatched event id and fails for the ids it is told to.
    #[derive(Clone, Default)]
    struct RecordingDispatcher {
        sent: Arc<Mutex<Vec<EventId>>>,
        failing: Arc<Mutex<Vec<EventId>>>,
    }

    impl RecordingDispatcher {
        fn sent(&self) -> Vec<EventId> {
            self.sent.lock().unwrap().clone()
        }

        fn fail_for(&self, event_id: EventId) {
            self.failing.lock().unwrap().push(event_id);
        }

        fn recover(&self) {
            self.failing.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl RecordDispatcher for RecordingDispatcher {
        async fn dispatch(&self, record: &OutboxRecord) -> std::result::Result<(), DispatchError> {
            if self.failing.lock().unwrap().contains(&record.event_id) {
                return Err(DispatchError::Transport("broker down".to_string()));
            }
            let event: TestEvent = record.decode()?;
            self.sent.lock().unwrap().push(event.id);
            Ok(())
        }
    }

    async fn store_with(records: &[OutboxRecord]) -> InMemoryStore<TestAggregate> {
        let store = InMemoryStore::new();
        let mut unit = UnitOfWork::new();
        for record in records {
            unit = unit.append(record.clone());
        }
        store.commit(unit).await.unwrap();
        store
    }

    fn record() -> OutboxRecord {
        OutboxRecord::from_event(&TestEvent::new("payload")).unwrap()
    }

    fn relay(
        store: &InMemoryStore<TestAggregate>,
        dispatcher: &RecordingDispatcher,
    ) -> OutboxRelay<InMemoryStore<TestAggregate>> {
        let registry = DispatchRegistry::new().with(EventType::OrderCreated, dispatcher.clone());
        OutboxRelay::new("test", store.clone(), registry)
    }

    #[test]
    fn default_poll_interval_is_five_seconds() {
        assert_eq!(RelayConfig::default().poll_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn empty_outbox_produces_empty_report() {
        let store = store_with(&[]).await;
        let dispatcher = RecordingDispatcher::default();

        let report = relay(&store, &dispatcher).run_once().await.unwrap();

        assert_eq!(report, RelayReport::default());
        assert!(dispatcher.sent().is_empty());
    }

    #[tokio::test]
    async fn publishes_and_marks_every_record() {
        let records = [record(), record(), record()];
        let store = store_with(&records).await;
        let dispatcher = RecordingDispatcher::default();

        let report = relay(&store, &dispatcher).run_once().await.unwrap();

        assert_eq!(report.published, 3);
        assert_eq!(store.unprocessed_count().await, 0);
        let expected: Vec<_> = records.iter().map(|r| r.event_id).collect();
        assert_eq!(dispatcher.sent(), expected);
    }

    #[tokio::test]
    async fn second_pass_publishes_nothing() {
        let store = store_with(&[record()]).await;
        let dispatcher = RecordingDispatcher::default();
        let relay = relay(&store, &dispatcher);

        relay.run_once().await.unwrap();
        let report = relay.run_once().await.unwrap();

        assert_eq!(report.scanned, 0);
        assert_eq!(dispatcher.sent().len(), 1);
    }

    #[tokio::test]
    async fn failed_publish_leaves_record_for_next_pass() {
        let failing = record();
        let healthy = record();
        let store = store_with(&[failing.clone(), healthy.clone()]).await;
        let dispatcher = RecordingDispatcher::default();
        dispatcher.fail_for(failing.event_id);
        let relay = relay(&store, &dispatcher);

        let report = relay.run_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.published, 1);
        assert_eq!(dispatcher.sent(), vec![healthy.event_id]);

        let pending = store.find_unprocessed().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, failing.event_id);

        dispatcher.recover();
        let report = relay.run_once().await.unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(store.unprocessed_count().await, 0);
        assert_eq!(dispatcher.sent(), vec![healthy.event_id, failing.event_id]);
    }

    #[tokio::test]
    async fn unknown_event_type_is_skipped_and_left_unprocessed() {
        let unknown = OutboxRecord::new(EventId::new(), EventType::PaymentFailed, b"{}".to_vec());
        let known = record();
        let store = store_with(&[unknown.clone(), known.clone()]).await;
        let dispatcher = RecordingDispatcher::default();

        let report = relay(&store, &dispatcher).run_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.published, 1);
        let pending = store.find_unprocessed().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_id, unknown.event_id);
    }

    #[tokio::test]
    async fn malformed_payload_counts_as_failure() {
        let broken = OutboxRecord::new(EventId::new(), EventType::OrderCreated, b"invalid".to_vec());
        let store = store_with(&[broken]).await;
        let dispatcher = RecordingDispatcher::default();

        let report = relay(&store, &dispatcher).run_once().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(store.unprocessed_count().await, 1);
    }

    #[tokio::test]
    async fn registry_replaces_dispatcher_for_same_type() {
        let first = RecordingDispatcher::default();
        let second = RecordingDispatcher::default();
        let mut registry = DispatchRegistry::new();
        registry.register(EventType::OrderCreated, first);
        registry.register(EventType::OrderCreated, second.clone());
        assert_eq!(registry.len(), 1);

        let store = store_with(&[record()]).await;
        OutboxRelay::new("test", store, registry)
            .run_once()
            .await
            .unwrap();

        assert_eq!(second.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_relay_drains_outbox_and_stops_on_cancel() {
        let store = store_with(&[record(), record()]).await;
        let dispatcher = RecordingDispatcher::default();
        let token = CancellationToken::new();

        let handle = relay(&store, &dispatcher)
            .with_config(RelayConfig::default().with_poll_interval(Duration::from_millis(100)))
            .spawn(token.clone());

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(store.unprocessed_count().await, 0);
        assert_eq!(dispatcher.sent().len(), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let config = RelayConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_relay_with_zero_interval_still_drains_outbox() {
        let store = store_with(&[record()]).await;
        let dispatcher = RecordingDispatcher::default();
        let token = CancellationToken::new();

        let handle = relay(&store, &dispatcher)
            .with_config(RelayConfig {
                poll_interval: Duration::ZERO,
            })
            .spawn(token.clone());

        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.unprocessed_count().await, 0);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_outbox_is_reported_as_error() {
        struct BrokenStore;

        #[async_trait]
        impl OutboxStore for BrokenStore {
            async fn find_unprocessed(&self) -> Result<Vec<OutboxRecord>> {
                Err(StoreError::Unavailable("down".to_string()))
            }

            async fn mark_processed(&self, _event_id: EventId) -> Result<bool> {
                Ok(false)
            }
        }

        let result = OutboxRelay::new("broken", BrokenStore, DispatchRegistry::new())
            .run_once()
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
