//! Persistence seams: catalog, orders and profiles.
//!
//! Two backends implement every trait: [`memory`] for development and tests,
//! [`postgres`] for deployments with `DATABASE_URL` set. Session state goes
//! through `tower-sessions` and its own stores.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::aggregates::{NewOrder, Order, OrderLine, Product, Profile, Review, Sale};
use crate::domain::value_objects::{OrderId, ProductId, UserId};

pub mod memory;
pub mod postgres;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    /// Products among `ids` that exist, in id order.
    async fn products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>>;
    /// First sale for the product whose window contains `on`.
    async fn active_sale(&self, id: ProductId, on: NaiveDate) -> StoreResult<Option<Sale>>;
    /// Every sale whose window contains `on`, by start date.
    async fn active_sales(&self, on: NaiveDate) -> StoreResult<Vec<Sale>>;
    /// Stores the review and recomputes the product rating in one step.
    /// Returns all reviews of the product, oldest first.
    async fn add_review(&self, review: &Review) -> StoreResult<Vec<Review>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_draft(&self, order: NewOrder) -> StoreResult<Order>;
    /// The order together with its persisted line items.
    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>>;
    /// Writes the order row.
    async fn save(&self, order: &Order) -> StoreResult<()>;
    /// Writes the order row and its line items atomically. A line for an
    /// (order, product) pair that already exists is left as is. Returns the
    /// number of lines inserted.
    async fn finalize(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<usize>;
    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Order>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, user: UserId) -> StoreResult<Option<Profile>>;
    async fn upsert(&self, profile: &Profile) -> StoreResult<()>;
}
