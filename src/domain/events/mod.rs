//! Domain events
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{Money, OrderId, UserId};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Cart(CartEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Drafted { order_id: OrderId, user_id: UserId, total_cost: Money },
    Finalized { order_id: OrderId, total_cost: Money },
    Paid { order_id: OrderId },
    PaymentFailed { order_id: OrderId },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    /// The cart was emptied because it became this order.
    Cleared { order_id: OrderId },
}

impl DomainEvent {
    /// NATS subject, e.g. `megano.orders.paid`.
    pub fn subject(&self) -> String {
        match self {
            Self::Order(e) => {
                let kind = match e {
                    OrderEvent::Drafted { .. } => "drafted",
                    OrderEvent::Finalized { .. } => "finalized",
                    OrderEvent::Paid { .. } => "paid",
                    OrderEvent::PaymentFailed { .. } => "payment_failed",
                };
                format!("megano.orders.{kind}")
            }
            Self::Cart(CartEvent::Cleared { .. }) => "megano.cart.cleared".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent, occurred_at: DateTime<Utc>) -> Self {
        Self { event_id: Uuid::now_v7(), occurred_at, event }
    }
}
