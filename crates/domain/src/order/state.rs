//! Order status and its transitions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::payment::PaymentStatus;

/// The status of an order.
///
/// ```text
/// Created ──PaymentCompleted──► Completed
///    │
///    └─────PaymentFailed─────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting the payment outcome.
    #[default]
    Created,

    /// Paid (terminal).
    Completed,

    /// Payment failed (terminal).
    Cancelled,
}

/// Result of applying a payment outcome to an order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The status moves to the given value.
    To(OrderStatus),
    /// The outcome was already applied; nothing changes.
    Unchanged,
    /// No transition is defined for this status and outcome.
    Undefined,
}

impl OrderStatus {
    /// Computes the transition for a payment outcome.
    pub fn on_payment(self, outcome: PaymentStatus) -> Transition {
        match (self, outcome) {
            (OrderStatus::Created, PaymentStatus::Completed) => {
                Transition::To(OrderStatus::Completed)
            }
            (OrderStatus::Created, PaymentStatus::Failed) => Transition::To(OrderStatus::Cancelled),
            (OrderStatus::Completed, PaymentStatus::Completed)
            | (OrderStatus::Cancelled, PaymentStatus::Failed) => Transition::Unchanged,
            _ => Transition::Undefined,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(OrderStatus::Created),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
