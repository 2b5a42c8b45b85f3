//! Catalog read model: products and time-bounded sales.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub full_description: String,
    pub price: Money,
    /// Units currently available. May be negative in legacy rows.
    pub count: i32,
    #[serde(default = "enabled")]
    pub free_delivery: bool,
    #[serde(default, with = "rust_decimal::serde::str")]
    pub rating: Decimal,
    #[serde(default)]
    pub limited: bool,
    #[serde(default = "enabled")]
    pub active: bool,
}

fn enabled() -> bool { true }

impl Product {
    pub fn new(id: ProductId, title: impl Into<String>, price: Money, count: i32) -> Self {
        Self {
            id, title: title.into(), description: String::new(), full_description: String::new(),
            price, count, free_delivery: true, rating: Decimal::ZERO, limited: false, active: true,
        }
    }

    pub fn stock(&self) -> u32 { u32::try_from(self.count).unwrap_or(0) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub product_id: ProductId,
    pub sale_price: Money,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Sale {
    /// Inclusive on both ends. An open bound never matches.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) => from <= day && day <= to,
            _ => false,
        }
    }
}

/// Everything the cart needs to know about a product at mutation time.
#[derive(Clone, Debug, PartialEq)]
pub struct StockedProduct {
    pub id: ProductId,
    pub price: Money,
    pub stock: u32,
    pub sale_price: Option<Money>,
}

impl StockedProduct {
    pub fn new(product: &Product, active_sale: Option<&Sale>) -> Self {
        Self {
            id: product.id,
            price: product.price,
            stock: product.stock(),
            sale_price: active_sale.map(|s| s.sale_price),
        }
    }

    pub fn effective_price(&self) -> Money { self.sale_price.unwrap_or(self.price) }
}
