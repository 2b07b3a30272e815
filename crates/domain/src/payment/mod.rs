//! Payment aggregate and service.

mod aggregate;
mod decider;
mod postgres;
mod service;

pub use aggregate::{Payment, PaymentCreate, PaymentStatus};
pub use decider::{FixedDecider, PaymentDecider, RandomDecider};
pub use postgres::PAYMENT_SCHEMA;
pub use service::{PaymentRepository, PaymentService, PaymentStore};
