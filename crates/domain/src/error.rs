//! Domain error types.

use common::{OrderId, PaymentId};
use outbox::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No order exists with the given id.
    #[error("Order not found with id: {0}")]
    OrderNotFound(OrderId),

    /// No payment exists with the given id.
    #[error("Payment not found with id: {0}")]
    PaymentNotFound(PaymentId),

    /// No payment exists for the given order.
    #[error("Payment not found with order id: {0}")]
    PaymentForOrderNotFound(OrderId),

    /// The order already has a payment.
    #[error("Payment already exists for order id: {0}")]
    PaymentAlreadyExists(OrderId),

    /// The caller supplied invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DomainError::OrderNotFound(_)
                | DomainError::PaymentNotFound(_)
                | DomainError::PaymentForOrderNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Validates the amount of an order or payment.
pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(DomainError::InvalidInput(format!(
            "amount must be a positive number, got {amount}"
        )));
    }
    Ok(())
}
