use async_trait::async_trait;
use common::OrderId;
use outbox::{PgAggregate, Result, StoreError};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use super::{Order, OrderStatus};

/// Schema holding the order service's tables.
pub const ORDER_SCHEMA: &str = "orders";

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        created_at: row.try_get("created_at")?,
        status: status.parse::<OrderStatus>().map_err(StoreError::InvalidRow)?,
        product: row.try_get("product")?,
        amount: row.try_get("amount")?,
    })
}

#[async_trait]
impl PgAggregate for Order {
    async fn fetch(pool: &PgPool, schema: &str, id: OrderId) -> Result<Option<Self>> {
        let row = sqlx::query(&format!(
            "SELECT id, created_at, status, product, amount FROM {schema}.product_order WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn upsert(&self, conn: &mut PgConnection, schema: &str) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {schema}.product_order (id, created_at, status, product, amount)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#
        ))
        .bind(self.id.as_uuid())
        .bind(self.created_at)
        .bind(self.status.as_str())
        .bind(&self.product)
        .bind(self.amount)
        .execute(conn)
        .await?;
        Ok(())
    }
}
