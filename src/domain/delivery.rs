//! Delivery surcharge rule applied once at checkout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::value_objects::Money;

/// Delivery type label as submitted by the client. Only `"express"` is special.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryType(String);

impl DeliveryType {
    pub const EXPRESS: &'static str = "express";

    pub fn new(label: impl Into<String>) -> Self { Self(label.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn is_express(&self) -> bool { self.0 == Self::EXPRESS }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryPricing {
    pub express_fee: Money,
    pub standard_fee: Money,
    /// Orders at or above this total ship at no charge on standard delivery.
    pub free_threshold: Money,
}

impl Default for DeliveryPricing {
    fn default() -> Self {
        Self { express_fee: Money::units(500), standard_fee: Money::units(200), free_threshold: Money::units(2000) }
    }
}

impl DeliveryPricing {
    pub fn surcharge(&self, delivery: &DeliveryType, total: Money) -> Money {
        if delivery.is_express() {
            self.express_fee
        } else if total < self.free_threshold {
            self.standard_fee
        } else {
            Money::ZERO
        }
    }
}
