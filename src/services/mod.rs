//! Application services: the cart engine and order assembler wired to stores.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Mutex, PoisonError};

pub mod cart;
pub mod catalog;
pub mod locks;
pub mod orders;
pub mod payment;
pub mod profiles;
pub mod publisher;

pub use cart::CartService;
pub use catalog::{CatalogService, NewReview, SalesPage};
pub use locks::KeyedLocks;
pub use orders::{OrderDetails, OrderItem, OrderService};
pub use payment::{ParityCardValidator, PaymentDecision, PaymentValidator};
pub use profiles::{ProfileService, ProfileUpdate};
pub use publisher::EventPublisher;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    /// Date used for sale windows.
    fn today(&self) -> NaiveDate { self.now().date_naive() }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self { Self(Mutex::new(at)) }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap_or_else(PoisonError::into_inner) }
}
