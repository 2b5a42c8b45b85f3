//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use thiserror::Error;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(value: i64) -> Self { Self(value) }
            pub const fn get(self) -> i64 { self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }

        impl FromStr for $name {
            type Err = ValueError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self).map_err(|_| ValueError::InvalidId(s.to_string()))
            }
        }
    };
}

row_id!(
    /// Catalog product identifier. Rendered as a decimal string when used as a cart key.
    ProductId
);
row_id!(OrderId);
row_id!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),
    #[error("quantity must be positive")]
    ZeroQuantity,
    #[error("card number must be 1 to 19 digits")]
    InvalidCardNumber,
}

/// Caller identity as reported by the upstream auth layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User(UserId),
}

impl Identity {
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous => None,
        }
    }
}

/// Positive item count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Self = Self(1);

    pub fn new(value: u32) -> Result<Self, ValueError> {
        if value == 0 { return Err(ValueError::ZeroQuantity); }
        Ok(Self(value))
    }
    pub const fn value(&self) -> u32 { self.0 }
    pub fn checked_add(&self, other: Quantity) -> Option<Self> { self.0.checked_add(other.0).map(Self) }
    /// One unit fewer, or `None` when this is the last unit.
    pub fn decremented(&self) -> Option<Self> {
        if self.0 > 1 { Some(Self(self.0 - 1)) } else { None }
    }
}

impl TryFrom<u32> for Quantity {
    type Error = ValueError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Exact decimal amount in the store currency. Always a decimal string on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub const fn new(amount: Decimal) -> Self { Self(amount) }
    /// Whole currency units.
    pub fn units(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub const fn amount(&self) -> Decimal { self.0 }
    pub fn times(&self, qty: Quantity) -> Money { Money(self.0 * Decimal::from(qty.value())) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) { self.0 += rhs.0; }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, Add::add) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Decimal::from_str_exact(s).map(Self) }
}

/// Payment card number. Accepted as a JSON string or number.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CardNumberInput")]
pub struct CardNumber(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum CardNumberInput {
    Text(String),
    Number(u64),
}

impl CardNumber {
    pub fn new(value: impl Into<String>) -> Result<Self, ValueError> {
        let value: String = value.into().trim().to_string();
        if value.is_empty() || value.len() > 19 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::InvalidCardNumber);
        }
        Ok(Self(value))
    }
    pub fn last_digit(&self) -> u8 {
        self.0.bytes().last().map_or(0, |b| b - b'0')
    }
    /// Last four digits, for logs.
    pub fn masked(&self) -> String {
        let tail = &self.0[self.0.len().saturating_sub(4)..];
        format!("****{tail}")
    }
}

impl TryFrom<CardNumberInput> for CardNumber {
    type Error = ValueError;
    fn try_from(input: CardNumberInput) -> Result<Self, Self::Error> {
        match input {
            CardNumberInput::Text(s) => Self::new(s),
            CardNumberInput::Number(n) => Self::new(n.to_string()),
        }
    }
}

impl fmt::Debug for CardNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_tuple("CardNumber").field(&self.masked()).finish() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_zero() {
        assert_eq!(Quantity::new(0), Err(ValueError::ZeroQuantity));
        assert_eq!(Quantity::new(3).unwrap().decremented(), Some(Quantity::new(2).unwrap()));
        assert_eq!(Quantity::ONE.decremented(), None);
    }

    #[test]
    fn test_money_is_a_decimal_string() {
        let price: Money = "1999.90".parse().unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"1999.90\"");
        let back: Money = serde_json::from_str("\"1999.90\"").unwrap();
        assert_eq!(back, price);
        assert_eq!(price.times(Quantity::new(3).unwrap()).to_string(), "5999.70");
    }

    #[test]
    fn test_card_number_from_string_or_number() {
        let a: CardNumber = serde_json::from_str("\"4242\"").unwrap();
        let b: CardNumber = serde_json::from_str("4242").unwrap();
        assert!(a == b);
        assert_eq!(a.last_digit(), 2);
        assert!(serde_json::from_str::<CardNumber>("\"42a2\"").is_err());
        assert!(CardNumber::new("").is_err());
    }
}
