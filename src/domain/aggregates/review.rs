//! Product reviews and the rating derived from them.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ProductId;

/// Highest rate a review can give.
pub const MAX_RATE: u8 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub product_id: ProductId,
    pub author: String,
    pub email: String,
    pub text: String,
    pub rate: u8,
    pub created_at: DateTime<Utc>,
}

/// Mean of the rates rounded half away from zero to one decimal place, the
/// precision of the stored rating. `None` when there are no rates.
pub fn average_rating<I>(rates: I) -> Option<Decimal>
where
    I: IntoIterator<Item = u8>,
{
    let (sum, n) = rates.into_iter().fold((Decimal::ZERO, 0u32), |(sum, n), r| (sum + Decimal::from(r), n + 1));
    if n == 0 {
        return None;
    }
    Some((sum / Decimal::from(n)).round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_average_rating_is_exact() {
        assert_eq!(average_rating(Vec::<u8>::new()), None);
        assert_eq!(average_rating([5u8]), Some(Decimal::from(5)));
        assert_eq!(average_rating([4u8, 5]), Some(Decimal::from_str("4.5").unwrap()));
        // 13 / 3 = 4.333..
        assert_eq!(average_rating([4u8, 4, 5]), Some(Decimal::from_str("4.3").unwrap()));
        // 14 / 3 = 4.666..
        assert_eq!(average_rating([4u8, 5, 5]), Some(Decimal::from_str("4.7").unwrap()));
        assert_eq!(average_rating([1u8, 2, 2, 2]), Some(Decimal::from_str("1.8").unwrap()));
    }
}
