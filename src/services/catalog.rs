//! Catalog reads: product detail, the sales listing and reviews.

use std::sync::Arc;
use tracing::instrument;

use super::Clock;
use crate::domain::aggregates::{Product, Review, Sale, MAX_RATE};
use crate::domain::value_objects::{Identity, ProductId};
use crate::error::{AppError, Result};
use crate::store::CatalogStore;

/// Sales shown per page.
pub const SALES_PAGE_SIZE: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct SalesPage {
    pub items: Vec<(Sale, Product)>,
    pub current_page: usize,
    pub last_page: usize,
}

#[derive(Clone, Debug)]
pub struct NewReview {
    pub author: String,
    pub email: String,
    pub text: String,
    pub rate: u8,
}

pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, clock }
    }

    /// A product with the sale running today, if any.
    pub async fn product(&self, id: ProductId) -> Result<(Product, Option<Sale>)> {
        let product = self.catalog.product(id).await?.ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
        let sale = self.catalog.active_sale(id, self.clock.today()).await?;
        Ok((product, sale))
    }

    /// One page of today's sales, earliest start first. Pages are numbered
    /// from 1 and an empty listing still has a single, empty page.
    #[instrument(skip(self))]
    pub async fn sales(&self, page: usize) -> Result<SalesPage> {
        if page == 0 {
            return Err(AppError::ValidationFailed("currentPage starts at 1".into()));
        }
        let sales = self.catalog.active_sales(self.clock.today()).await?;
        let last_page = sales.len().div_ceil(SALES_PAGE_SIZE).max(1);
        if page > last_page {
            return Err(AppError::NotFound(format!("sales page {page}")));
        }

        let window: Vec<Sale> = sales.into_iter().skip((page - 1) * SALES_PAGE_SIZE).take(SALES_PAGE_SIZE).collect();
        let ids: Vec<ProductId> = window.iter().map(|s| s.product_id).collect();
        let products = self.catalog.products(&ids).await?;
        let items = window
            .into_iter()
            .filter_map(|sale| {
                let product = products.iter().find(|p| p.id == sale.product_id)?.clone();
                Some((sale, product))
            })
            .collect();
        Ok(SalesPage { items, current_page: page, last_page })
    }

    /// Stores a review from a signed-in user and returns every review of the product.
    #[instrument(skip(self, review), fields(rate = review.rate))]
    pub async fn add_review(&self, identity: Identity, product_id: ProductId, review: NewReview) -> Result<Vec<Review>> {
        identity.user().ok_or(AppError::Unauthenticated)?;
        if !(1..=MAX_RATE).contains(&review.rate) {
            return Err(AppError::ValidationFailed(format!("rate must be between 1 and {MAX_RATE}")));
        }
        if self.catalog.product(product_id).await?.is_none() {
            return Err(AppError::NotFound(format!("product {product_id}")));
        }
        let review = Review {
            product_id,
            author: review.author,
            email: review.email,
            text: review.text,
            rate: review.rate,
            created_at: self.clock.now(),
        };
        let reviews = self.catalog.add_review(&review).await?;
        tracing::info!(%product_id, reviews = reviews.len(), "Review added");
        Ok(reviews)
    }
}
