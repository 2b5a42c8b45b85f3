//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;
pub mod profile;
pub mod review;

pub use cart::{AddOutcome, Cart, CartError, CartLine, RemoveOutcome, StockPolicy};
pub use order::{CheckoutDetails, NewOrder, Order, OrderError, OrderLine, OrderProduct, OrderStatus};
pub use product::{Product, Sale, StockedProduct};
pub use profile::Profile;
pub use review::{average_rating, Review, MAX_RATE};
