//! Cart Aggregate
//!
//! A session-scoped map of product id to `{count, price}`. The price is
//! snapshotted when the line is first added and never re-queried.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::aggregates::product::StockedProduct;
use crate::domain::value_objects::{Money, ProductId, Quantity};

/// What to do when an add would exceed available stock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockPolicy {
    /// Report `CartError::InsufficientStock`.
    #[default]
    Reject,
    /// Leave the cart untouched and report success.
    Ignore,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "count")]
    pub quantity: Quantity,
    #[serde(rename = "price")]
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.times(self.quantity) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome { Inserted, Incremented, Unchanged }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome { Absent, Decremented, Removed }

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    lines: BTreeMap<ProductId, CartLine>,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line(&self, id: ProductId) -> Option<&CartLine> { self.lines.get(&id) }
    pub fn product_ids(&self) -> Vec<ProductId> { self.lines.keys().copied().collect() }

    /// Lines in product id order. Recomputed from the map on every call.
    pub fn lines(&self) -> impl Iterator<Item = (ProductId, &CartLine)> + '_ {
        self.lines.iter().map(|(id, line)| (*id, line))
    }

    pub fn add(&mut self, product: &StockedProduct, quantity: Quantity, policy: StockPolicy) -> Result<AddOutcome, CartError> {
        let in_cart = self.lines.get(&product.id).map_or(0, |l| l.quantity.value());
        let wanted = match self.lines.get(&product.id) {
            Some(line) => line.quantity.checked_add(quantity),
            None => Some(quantity),
        };
        let fits = wanted.filter(|w| product.stock > 0 && w.value() <= product.stock);

        let Some(wanted) = fits else {
            return match policy {
                StockPolicy::Reject => Err(CartError::InsufficientStock {
                    product_id: product.id, requested: quantity.value(), in_cart, available: product.stock,
                }),
                StockPolicy::Ignore => Ok(AddOutcome::Unchanged),
            };
        };

        match self.lines.entry(product.id) {
            Entry::Occupied(mut e) => {
                e.get_mut().quantity = wanted;
                Ok(AddOutcome::Incremented)
            }
            Entry::Vacant(e) => {
                e.insert(CartLine { quantity: wanted, unit_price: product.effective_price() });
                Ok(AddOutcome::Inserted)
            }
        }
    }

    /// A count of exactly 1 takes one unit off; any other count drops the line.
    pub fn remove(&mut self, id: ProductId, count: u32) -> RemoveOutcome {
        let Some(line) = self.lines.get_mut(&id) else { return RemoveOutcome::Absent };
        if count == 1 {
            if let Some(fewer) = line.quantity.decremented() {
                line.quantity = fewer;
                return RemoveOutcome::Decremented;
            }
        }
        self.lines.remove(&id);
        RemoveOutcome::Removed
    }

    pub fn total_count(&self) -> u64 {
        self.lines.values().map(|l| u64::from(l.quantity.value())).sum()
    }

    pub fn total_price(&self) -> Money { self.lines.values().map(CartLine::line_total).sum() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("not enough stock for product {product_id}: requested {requested}, in cart {in_cart}, available {available}")]
    InsufficientStock { product_id: ProductId, requested: u32, in_cart: u32, available: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }

    fn stocked(id: i64, price: &str, stock: u32) -> StockedProduct {
        StockedProduct { id: ProductId::new(id), price: price.parse().unwrap(), stock, sale_price: None }
    }

    #[test]
    fn test_add_respects_stock() {
        let p = stocked(7, "10", 5);
        let mut cart = Cart::new();
        assert_eq!(cart.add(&p, qty(3), StockPolicy::Reject), Ok(AddOutcome::Inserted));
        let err = cart.add(&p, qty(3), StockPolicy::Reject).unwrap_err();
        assert_eq!(err, CartError::InsufficientStock { product_id: p.id, requested: 3, in_cart: 3, available: 5 });
        assert_eq!(cart.line(p.id).unwrap().quantity, qty(3));

        assert_eq!(cart.add(&p, qty(3), StockPolicy::Ignore), Ok(AddOutcome::Unchanged));
        assert_eq!(cart.add(&p, qty(2), StockPolicy::Reject), Ok(AddOutcome::Incremented));
        assert_eq!(cart.line(p.id).unwrap().quantity, qty(5));
    }

    #[test]
    fn test_repeated_adds_never_exceed_stock() {
        let p = stocked(1, "1", 4);
        let mut cart = Cart::new();
        for _ in 0..10 {
            let _ = cart.add(&p, qty(3), StockPolicy::Ignore);
            let _ = cart.add(&p, qty(1), StockPolicy::Reject);
            assert!(cart.line(p.id).unwrap().quantity.value() <= 4);
        }
    }

    #[test]
    fn test_zero_stock_is_never_inserted() {
        let p = stocked(2, "5", 0);
        let mut cart = Cart::new();
        assert!(cart.add(&p, qty(1), StockPolicy::Reject).is_err());
        assert_eq!(cart.add(&p, qty(1), StockPolicy::Ignore), Ok(AddOutcome::Unchanged));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_first_add_over_stock_is_rejected() {
        let mut cart = Cart::new();
        assert!(cart.add(&stocked(3, "5", 2), qty(3), StockPolicy::Reject).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_rules() {
        let p = stocked(1, "2.50", 10);
        let mut cart = Cart::new();
        cart.add(&p, qty(3), StockPolicy::Reject).unwrap();
        assert_eq!(cart.remove(p.id, 1), RemoveOutcome::Decremented);
        assert_eq!(cart.line(p.id).unwrap().quantity, qty(2));
        assert_eq!(cart.remove(p.id, 2), RemoveOutcome::Removed);
        assert_eq!(cart.remove(p.id, 1), RemoveOutcome::Absent);

        cart.add(&p, qty(1), StockPolicy::Reject).unwrap();
        assert_eq!(cart.remove(p.id, 1), RemoveOutcome::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals_are_exact() {
        let mut cart = Cart::new();
        let a = stocked(1, "0.10", 100);
        let b = stocked(2, "0.20", 100);
        for _ in 0..30 {
            cart.add(&a, qty(1), StockPolicy::Reject).unwrap();
            cart.add(&b, qty(2), StockPolicy::Reject).unwrap();
            cart.remove(b.id, 1);
        }
        assert_eq!(cart.total_count(), 60);
        assert_eq!(cart.total_price(), "9.00".parse().unwrap());
    }

    #[test]
    fn test_sale_price_is_snapshotted() {
        let mut p = stocked(9, "100", 10);
        p.sale_price = Some("75.50".parse().unwrap());
        let mut cart = Cart::new();
        cart.add(&p, qty(1), StockPolicy::Reject).unwrap();
        p.sale_price = None;
        cart.add(&p, qty(1), StockPolicy::Reject).unwrap();
        assert_eq!(cart.line(p.id).unwrap().unit_price, "75.50".parse().unwrap());
        assert_eq!(cart.total_price(), "151.00".parse().unwrap());
    }

    #[test]
    fn test_session_shape() {
        let mut cart = Cart::new();
        cart.add(&stocked(7, "10.50", 5), qty(2), StockPolicy::Reject).unwrap();
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json, serde_json::json!({"7": {"count": 2, "price": "10.50"}}));
        let back: Cart = serde_json::from_value(json).unwrap();
        assert_eq!(back, cart);
    }
}
