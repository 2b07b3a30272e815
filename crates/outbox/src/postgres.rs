use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EventId, EventType};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Aggregate, OutboxRecord, ProcessedEventRecord, Result, StoreError,
    store::{AggregateStore, OutboxStore, ProcessedEventStore, UnitOfWork},
};

/// An aggregate that knows how to read and write its own row.
///
/// `schema` names the service's Postgres schema; the outbox and ledger tables
/// of that service live next to the aggregate table.
#[async_trait]
pub trait PgAggregate: Aggregate {
    /// Loads the aggregate row by id.
    async fn fetch(pool: &PgPool, schema: &str, id: Self::Id) -> Result<Option<Self>>;

    /// Inserts or updates the aggregate row inside an open transaction.
    async fn upsert(&self, conn: &mut PgConnection, schema: &str) -> Result<()>;
}

/// PostgreSQL-backed store for one service.
pub struct PostgresStore<A> {
    pool: PgPool,
    schema: &'static str,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for PostgresStore<A> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            schema: self.schema,
            _aggregate: PhantomData,
        }
    }
}

impl<A> PostgresStore<A> {
    /// Creates a store over the tables in `schema`.
    pub fn new(pool: PgPool, schema: &'static str) -> Self {
        Self {
            pool,
            schema,
            _aggregate: PhantomData,
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Returns the schema holding this service's tables.
    pub fn schema(&self) -> &'static str {
        self.schema
    }

    /// Runs the database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<Option<OutboxRecord>> {
        let event_id = EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?);
        let raw_type: String = row.try_get("event_type")?;

        let Ok(event_type) = raw_type.parse::<EventType>() else {
            tracing::warn!(%event_id, event_type = %raw_type, "skipping outbox record with unknown event type");
            return Ok(None);
        };

        Ok(Some(OutboxRecord {
            event_id,
            event_type,
            payload: row.try_get("payload")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            processed: row.try_get("processed")?,
        }))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl<A: PgAggregate> AggregateStore<A> for PostgresStore<A> {
    async fn find_by_id(&self, id: A::Id) -> Result<Option<A>> {
        A::fetch(&self.pool, self.schema, id).await
    }

    async fn commit(&self, unit: UnitOfWork<A>) -> Result<()> {
        let (aggregate, outbox, processed) = unit.into_parts();
        let schema = self.schema;

        let mut tx = self.pool.begin().await?;

        // Ledger first: a concurrent duplicate blocks here and then conflicts.
        if let Some(entry) = processed {
            sqlx::query(&format!(
                "INSERT INTO {schema}.processed_event (event_id, processed_at) VALUES ($1, $2)"
            ))
            .bind(entry.event_id.as_uuid())
            .bind(entry.processed_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::Conflict(entry.event_id);
                }
                StoreError::Database(e)
            })?;
        }

        if let Some(aggregate) = &aggregate {
            aggregate.upsert(&mut *tx, schema).await?;
        }

        for record in &outbox {
            sqlx::query(&format!(
                r#"
                INSERT INTO {schema}.outbox (event_id, event_type, payload, created_at, processed)
                VALUES ($1, $2, $3, $4, $5)
                "#
            ))
            .bind(record.event_id.as_uuid())
            .bind(record.event_type.as_str())
            .bind(&record.payload)
            .bind(record.created_at)
            .bind(record.processed)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return StoreError::DuplicateOutboxRecord(record.event_id);
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await?;

        if let Some(aggregate) = aggregate {
            tracing::debug!(
                aggregate_type = A::aggregate_type(),
                aggregate_id = %aggregate.id(),
                outbox_records = outbox.len(),
                "committed unit of work"
            );
        }

        Ok(())
    }
}

#[async_trait]
impl<A: Send + Sync + 'static> OutboxStore for PostgresStore<A> {
    async fn find_unprocessed(&self) -> Result<Vec<OutboxRecord>> {
        let schema = self.schema;
        let rows = sqlx::query(&format!(
            r#"
            SELECT event_id, event_type, payload, created_at, processed
            FROM {schema}.outbox
            WHERE processed = FALSE
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(record) = Self::row_to_record(row)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn mark_processed(&self, event_id: EventId) -> Result<bool> {
        let schema = self.schema;
        let result = sqlx::query(&format!(
            "UPDATE {schema}.outbox SET processed = TRUE WHERE event_id = $1 AND processed = FALSE"
        ))
        .bind(event_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%event_id, schema, "outbox record missing or already processed");
            return Ok(false);
        }
        Ok(true)
    }
}

#[async_trait]
impl<A: Send + Sync + 'static> ProcessedEventStore for PostgresStore<A> {
    async fn exists(&self, event_id: EventId) -> Result<bool> {
        let schema = self.schema;
        let exists: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM {schema}.processed_event WHERE event_id = $1)"
        ))
        .bind(event_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, record: ProcessedEventRecord) -> Result<()> {
        let schema = self.schema;
        sqlx::query(&format!(
            "INSERT INTO {schema}.processed_event (event_id, processed_at) VALUES ($1, $2)"
        ))
        .bind(record.event_id.as_uuid())
        .bind(record.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return StoreError::Conflict(record.event_id);
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }
}
