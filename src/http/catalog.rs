//! Product detail, the sales listing and reviews.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::extract::{AppJson, AppPath, AppQuery, CurrentUser};
use crate::domain::aggregates::{Product, Review, Sale};
use crate::domain::value_objects::{Money, ProductId};
use crate::error::Result;
use crate::services::{NewReview, SalesPage};
use crate::state::AppState;

const REVIEW_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub full_description: String,
    pub price: Money,
    /// Sale price active today, if any.
    pub sale_price: Option<Money>,
    pub count: i32,
    pub free_delivery: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub rating: Decimal,
    pub limited: bool,
}

pub async fn get_product(State(s): State<AppState>, AppPath(id): AppPath<ProductId>) -> Result<Json<ProductView>> {
    let (p, sale) = s.products.product(id).await?;
    Ok(Json(ProductView {
        id: p.id, title: p.title, description: p.description, full_description: p.full_description,
        price: p.price, sale_price: sale.map(|s| s.sale_price), count: p.count, free_delivery: p.free_delivery,
        rating: p.rating, limited: p.limited,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesQuery {
    #[serde(default = "first_page")]
    pub current_page: usize,
}

fn first_page() -> usize { 1 }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleView {
    pub id: ProductId,
    pub price: Money,
    pub sale_price: Money,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub title: String,
    pub href: String,
}

impl From<(Sale, Product)> for SaleView {
    fn from((sale, product): (Sale, Product)) -> Self {
        Self {
            id: product.id,
            price: product.price,
            sale_price: sale.sale_price,
            date_from: sale.date_from.map(|d| d.to_string()),
            date_to: sale.date_to.map(|d| d.to_string()),
            title: product.title,
            href: format!("/product/{}", product.id),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesView {
    pub items: Vec<SaleView>,
    pub current_page: usize,
    pub last_page: usize,
}

impl From<SalesPage> for SalesView {
    fn from(page: SalesPage) -> Self {
        Self {
            items: page.items.into_iter().map(SaleView::from).collect(),
            current_page: page.current_page,
            last_page: page.last_page,
        }
    }
}

pub async fn list_sales(State(s): State<AppState>, AppQuery(q): AppQuery<SalesQuery>) -> Result<Json<SalesView>> {
    Ok(Json(s.products.sales(q.current_page).await?.into()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1, max = 100))]
    pub author: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(range(min = 1, max = 5))]
    pub rate: u8,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    pub author: String,
    pub email: String,
    pub text: String,
    pub rate: u8,
    pub date: String,
    pub product: ProductId,
}

impl From<Review> for ReviewView {
    fn from(r: Review) -> Self {
        Self {
            author: r.author,
            email: r.email,
            text: r.text,
            rate: r.rate,
            date: r.created_at.format(REVIEW_DATE_FORMAT).to_string(),
            product: r.product_id,
        }
    }
}

/// Returns every review of the product, oldest first, with 201.
pub async fn post_review(
    State(s): State<AppState>,
    CurrentUser(who): CurrentUser,
    AppPath(id): AppPath<ProductId>,
    AppJson(r): AppJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Vec<ReviewView>>)> {
    r.validate()?;
    let review = NewReview { author: r.author, email: r.email, text: r.text, rate: r.rate };
    let reviews = s.products.add_review(who, id, review).await?;
    Ok((StatusCode::CREATED, Json(reviews.into_iter().map(ReviewView::from).collect())))
}
