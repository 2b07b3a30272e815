//! Order aggregate and service.

mod aggregate;
mod postgres;
mod service;
mod state;

pub use aggregate::{Order, OrderCreate};
pub use postgres::ORDER_SCHEMA;
pub use service::{OrderService, OrderStore};
pub use state::{OrderStatus, Transition};
