//! Order Aggregate
//!
//! Lifecycle: a draft is created from the cart total, finalized once with
//! delivery details (which applies the delivery surcharge), then paid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::aggregates::profile::Profile;
use crate::domain::delivery::{DeliveryPricing, DeliveryType};
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, UserId};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "awaiting payment")]
    AwaitingPayment,
    #[serde(rename = "paid")]
    Paid,
    #[serde(rename = "payment failed")]
    PaymentFailed,
}

impl OrderStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::AwaitingPayment => "awaiting payment",
            Self::Paid => "paid",
            Self::PaymentFailed => "payment failed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        [Self::Draft, Self::AwaitingPayment, Self::Paid, Self::PaymentFailed].into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

/// Product reference captured when the draft is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProduct { pub product_id: ProductId, pub count: Quantity }

/// Authoritative line item, unique per (order, product).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine { pub order_id: OrderId, pub product_id: ProductId, pub count: Quantity }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub delivery_type: DeliveryType,
    pub payment_type: String,
    pub city: String,
    pub address: String,
    pub products: Vec<OrderProduct>,
}

/// Input for a new draft; the store assigns the id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_cost: Money,
    pub products: Vec<OrderProduct>,
    pub created_at: DateTime<Utc>,
    pub contact: Option<Profile>,
}

impl NewOrder {
    pub fn into_order(self, id: OrderId) -> Order {
        let contact = self.contact.unwrap_or_else(|| Profile::empty(self.user_id));
        Order {
            id, created_at: self.created_at, user_id: self.user_id,
            delivery_type: None, payment_type: String::new(), total_cost: self.total_cost,
            status: OrderStatus::Draft, city: String::new(), address: String::new(),
            full_name: contact.full_name, email: contact.email, phone: contact.phone,
            products: self.products, lines: vec![], has_line_items: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub(crate) id: OrderId,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) user_id: UserId,
    pub(crate) delivery_type: Option<DeliveryType>,
    pub(crate) payment_type: String,
    pub(crate) total_cost: Money,
    pub(crate) status: OrderStatus,
    pub(crate) city: String,
    pub(crate) address: String,
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) phone: String,
    pub(crate) products: Vec<OrderProduct>,
    pub(crate) lines: Vec<OrderLine>,
    pub(crate) has_line_items: bool,
}

impl Order {
    pub fn id(&self) -> OrderId { self.id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn delivery_type(&self) -> Option<&DeliveryType> { self.delivery_type.as_ref() }
    pub fn payment_type(&self) -> &str { &self.payment_type }
    pub fn total_cost(&self) -> Money { self.total_cost }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn city(&self) -> &str { &self.city }
    pub fn address(&self) -> &str { &self.address }
    pub fn full_name(&self) -> &str { &self.full_name }
    pub fn email(&self) -> &str { &self.email }
    pub fn phone(&self) -> &str { &self.phone }
    pub fn products(&self) -> &[OrderProduct] { &self.products }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn has_line_items(&self) -> bool { self.has_line_items }

    /// Applies checkout details and the delivery surcharge. Returns the line
    /// items to persist, one per product (first submission of a product wins).
    pub fn finalize(&mut self, details: CheckoutDetails, pricing: &DeliveryPricing) -> Result<Vec<OrderLine>, OrderError> {
        if self.status != OrderStatus::Draft {
            return Err(OrderError::InvalidTransition { from: self.status, action: "finalize" });
        }
        if details.products.is_empty() { return Err(OrderError::NoItems); }

        self.total_cost += pricing.surcharge(&details.delivery_type, self.total_cost);

        let mut lines: Vec<OrderLine> = Vec::with_capacity(details.products.len());
        for p in &details.products {
            if !lines.iter().any(|l| l.product_id == p.product_id) {
                lines.push(OrderLine { order_id: self.id, product_id: p.product_id, count: p.count });
            }
        }

        self.full_name = details.full_name;
        self.email = details.email;
        self.phone = details.phone;
        self.delivery_type = Some(details.delivery_type);
        self.payment_type = details.payment_type;
        self.city = details.city;
        self.address = details.address;
        self.status = OrderStatus::AwaitingPayment;
        self.has_line_items = true;
        Ok(lines)
    }

    pub fn record_payment(&mut self, approved: bool) -> Result<OrderStatus, OrderError> {
        match self.status {
            OrderStatus::AwaitingPayment | OrderStatus::PaymentFailed => {
                self.status = if approved { OrderStatus::Paid } else { OrderStatus::PaymentFailed };
                Ok(self.status)
            }
            from => Err(OrderError::InvalidTransition { from, action: "pay" }),
        }
    }

    /// Per-product counts: the persisted line items once they exist, the draft summary before.
    pub fn quantities(&self) -> Vec<(ProductId, Quantity)> {
        if self.has_line_items {
            self.lines.iter().map(|l| (l.product_id, l.count)).collect()
        } else {
            self.products.iter().map(|p| (p.product_id, p.count)).collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("order has no items")]
    NoItems,
    #[error("cannot {action} an order in status \"{from}\"")]
    InvalidTransition { from: OrderStatus, action: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(total: i64) -> Order {
        NewOrder {
            user_id: UserId::new(1),
            total_cost: Money::units(total),
            products: vec![OrderProduct { product_id: ProductId::new(7), count: Quantity::new(2).unwrap() }],
            created_at: Utc::now(),
            contact: None,
        }
        .into_order(OrderId::new(10))
    }

    fn details(delivery: &str) -> CheckoutDetails {
        CheckoutDetails {
            full_name: "Ann Smith".into(), email: "ann@example.com".into(), phone: "+100".into(),
            delivery_type: DeliveryType::new(delivery), payment_type: "online".into(),
            city: "Moscow".into(), address: "Red square 1".into(),
            products: vec![
                OrderProduct { product_id: ProductId::new(7), count: Quantity::new(3).unwrap() },
                OrderProduct { product_id: ProductId::new(7), count: Quantity::new(5).unwrap() },
            ],
        }
    }

    #[test]
    fn test_finalize_applies_surcharge_once() {
        let pricing = DeliveryPricing::default();
        let mut order = draft(1800);
        let lines = order.finalize(details("ordinary"), &pricing).unwrap();
        assert_eq!(order.total_cost(), Money::units(2000));
        assert_eq!(order.status(), OrderStatus::AwaitingPayment);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].count, Quantity::new(3).unwrap());

        let err = order.finalize(details("express"), &pricing).unwrap_err();
        assert_eq!(err, OrderError::InvalidTransition { from: OrderStatus::AwaitingPayment, action: "finalize" });
        assert_eq!(order.total_cost(), Money::units(2000));
    }

    #[test]
    fn test_finalize_totals() {
        let pricing = DeliveryPricing::default();
        let mut a = draft(2500);
        a.finalize(details("ordinary"), &pricing).unwrap();
        assert_eq!(a.total_cost(), Money::units(2500));
        let mut b = draft(1000);
        b.finalize(details("express"), &pricing).unwrap();
        assert_eq!(b.total_cost(), Money::units(1500));
    }

    #[test]
    fn test_payment_transitions() {
        let mut order = draft(100);
        assert!(order.record_payment(true).is_err());
        order.finalize(details("ordinary"), &DeliveryPricing::default()).unwrap();
        assert_eq!(order.record_payment(false), Ok(OrderStatus::PaymentFailed));
        assert_eq!(order.record_payment(true), Ok(OrderStatus::Paid));
        assert!(order.record_payment(true).is_err());
    }

    #[test]
    fn test_quantities_source() {
        let mut order = draft(100);
        assert_eq!(order.quantities(), vec![(ProductId::new(7), Quantity::new(2).unwrap())]);
        order.lines = order.finalize(details("ordinary"), &DeliveryPricing::default()).unwrap();
        assert_eq!(order.quantities(), vec![(ProductId::new(7), Quantity::new(3).unwrap())]);
    }

    #[test]
    fn test_status_labels_round_trip() {
        assert_eq!(OrderStatus::from_label("payment failed"), Some(OrderStatus::PaymentFailed));
        assert_eq!(serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap(), "\"awaiting payment\"");
        assert_eq!(OrderStatus::from_label("shipped"), None);
    }
}
