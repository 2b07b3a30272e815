//! Order and payment services.
//!
//! Both services follow the same shape:
//! - mutations commit the aggregate and its outbox record in one unit of work
//! - inbound events are checked against the deduplication ledger, and the
//!   ledger entry commits together with the effect

pub mod error;
pub mod order;
pub mod payment;

pub use error::{DomainError, Result};
pub use order::{
    ORDER_SCHEMA, Order, OrderCreate, OrderService, OrderStatus, OrderStore, Transition,
};
pub use payment::{
    FixedDecider, PAYMENT_SCHEMA, Payment, PaymentCreate, PaymentDecider, PaymentRepository,
    PaymentService, PaymentStatus, PaymentStore, RandomDecider,
};
