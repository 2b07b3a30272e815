use async_trait::async_trait;
use common::{OrderId, PaymentId};
use outbox::{PgAggregate, PostgresStore, Result, StoreError};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{Payment, PaymentRepository, PaymentStatus};

/// Schema holding the payment service's tables.
pub const PAYMENT_SCHEMA: &str = "payments";

const COLUMNS: &str = "id, order_id, created_at, status, amount";

fn row_to_payment(row: PgRow) -> Result<Payment> {
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        created_at: row.try_get("created_at")?,
        status: status.parse::<PaymentStatus>().map_err(StoreError::InvalidRow)?,
        amount: row.try_get("amount")?,
    })
}

#[async_trait]
impl PgAggregate for Payment {
    async fn fetch(pool: &PgPool, schema: &str, id: PaymentId) -> Result<Option<Self>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM {schema}.payment WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await?;

        row.map(row_to_payment).transpose()
    }

    async fn upsert(&self, conn: &mut PgConnection, schema: &str) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {schema}.payment ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#
        ))
        .bind(self.id.as_uuid())
        .bind(self.order_id.as_uuid())
        .bind(self.created_at)
        .bind(self.status.as_str())
        .bind(self.amount)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore<Payment> {
    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let schema = self.schema();
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM {schema}.payment WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(self.pool())
        .await?;

        row.map(row_to_payment).transpose()
    }
}
