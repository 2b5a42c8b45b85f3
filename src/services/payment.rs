//! Payment validation seam.

use async_trait::async_trait;

use crate::domain::value_objects::CardNumber;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentDecision {
    Approved,
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentValidator: Send + Sync {
    async fn validate(&self, card: &CardNumber) -> PaymentDecision;
}

/// Stand-in processor: a card is accepted iff its number is even and not a multiple of 10.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityCardValidator;

#[async_trait]
impl PaymentValidator for ParityCardValidator {
    async fn validate(&self, card: &CardNumber) -> PaymentDecision {
        match card.last_digit() {
            2 | 4 | 6 | 8 => PaymentDecision::Approved,
            0 => PaymentDecision::Declined { reason: "card number is a multiple of 10".into() },
            _ => PaymentDecision::Declined { reason: "card number is odd".into() },
        }
    }
}
