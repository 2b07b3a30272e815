//! Events exchanged between the order and payment services.

use chrono::{DateTime, Utc};
use common::{EventId, EventType, OrderId, PaymentId};
use outbox::IntegrationEvent;
use serde::{Deserialize, Serialize};

/// An order was placed and awaits payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub id: EventId,
    pub time: DateTime<Utc>,
    pub event_type: EventType,
    pub order_id: OrderId,
    pub product: String,
    pub amount: f64,
}

impl OrderCreated {
    pub fn new(order_id: OrderId, product: impl Into<String>, amount: f64) -> Self {
        Self {
            id: EventId::new(),
            time: Utc::now(),
            event_type: EventType::OrderCreated,
            order_id,
            product: product.into(),
            amount,
        }
    }
}

/// A payment for an order went through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompleted {
    pub id: EventId,
    pub time: DateTime<Utc>,
    pub event_type: EventType,
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: f64,
}

impl PaymentCompleted {
    pub fn new(payment_id: PaymentId, order_id: OrderId, amount: f64) -> Self {
        Self {
            id: EventId::new(),
            time: Utc::now(),
            event_type: EventType::PaymentCompleted,
            payment_id,
            order_id,
            amount,
        }
    }
}

/// A payment for an order was declined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailed {
    pub id: EventId,
    pub time: DateTime<Utc>,
    pub event_type: EventType,
    pub payment_id: PaymentId,
    pub order_id: OrderId,
}

impl PaymentFailed {
    pub fn new(payment_id: PaymentId, order_id: OrderId) -> Self {
        Self {
            id: EventId::new(),
            time: Utc::now(),
            event_type: EventType::PaymentFailed,
            payment_id,
            order_id,
        }
    }
}

macro_rules! integration_event {
    ($event:ty, $tag:expr) => {
        impl IntegrationEvent for $event {
            const EVENT_TYPE: EventType = $tag;

            fn event_id(&self) -> EventId {
                self.id
            }

            fn event_type(&self) -> EventType {
                self.event_type
            }

            fn emitted_at(&self) -> DateTime<Utc> {
                self.time
            }
        }
    };
}

integration_event!(OrderCreated, EventType::OrderCreated);
integration_event!(PaymentCompleted, EventType::PaymentCompleted);
integration_event!(PaymentFailed, EventType::PaymentFailed);
