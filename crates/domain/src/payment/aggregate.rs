use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use outbox::Aggregate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, validate_amount};

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreate {
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub amount: f64,
}

impl PaymentCreate {
    pub fn new(order_id: OrderId, status: PaymentStatus, amount: f64) -> Self {
        Self {
            order_id,
            status,
            amount,
        }
    }
}

/// A payment made for an order. At most one exists per order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: PaymentStatus,
    pub amount: f64,
}

impl Payment {
    pub fn record(input: PaymentCreate) -> Result<Self> {
        validate_amount(input.amount)?;
        Ok(Self {
            id: PaymentId::new(),
            order_id: input.order_id,
            created_at: Utc::now(),
            status: input.status,
            amount: input.amount,
        })
    }
}

impl Aggregate for Payment {
    type Id = PaymentId;

    fn aggregate_type() -> &'static str {
        "Payment"
    }

    fn id(&self) -> PaymentId {
        self.id
    }
}
