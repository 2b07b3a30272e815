use chrono::{DateTime, Utc};
use common::OrderId;
use outbox::Aggregate;
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::error::{DomainError, Result, validate_amount};

/// Input for placing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreate {
    pub product: String,
    pub amount: f64,
}

impl OrderCreate {
    pub fn new(product: impl Into<String>, amount: f64) -> Self {
        Self {
            product: product.into(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.product.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "product must not be empty".to_string(),
            ));
        }
        validate_amount(self.amount)
    }
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub product: String,
    pub amount: f64,
}

impl Order {
    /// Creates a new order in the `Created` status.
    pub fn place(input: OrderCreate) -> Result<Self> {
        input.validate()?;
        Ok(Self {
            id: OrderId::new(),
            created_at: Utc::now(),
            status: OrderStatus::Created,
            product: input.product,
            amount: input.amount,
        })
    }

    /// Returns a copy of this order with a new status.
    pub fn with_status(&self, status: OrderStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }
}

impl Aggregate for Order {
    type Id = OrderId;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> OrderId {
        self.id
    }
}
