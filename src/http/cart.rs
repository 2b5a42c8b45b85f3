//! Basket endpoints. The cart lives in the caller's session.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::extract::AppJson;
use crate::domain::aggregates::Cart;
use crate::domain::value_objects::{Money, ProductId, Quantity};
use crate::error::Result;
use crate::services::cart::CartItem;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToBasket { pub id: ProductId, pub count: u32 }

#[derive(Debug, Deserialize)]
pub struct RemoveFromBasket {
    pub id: ProductId,
    /// 1 removes a single unit. Omitted or any other value drops the line.
    #[serde(default)]
    pub count: Option<u32>,
}

/// Catalog product with the cart's count and snapshotted price.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasketItem {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Money,
    pub count: u32,
    pub total: Money,
    pub free_delivery: bool,
    #[serde(with = "rust_decimal::serde::str")]
    pub rating: Decimal,
}

impl From<CartItem> for BasketItem {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.product.id,
            title: item.product.title,
            description: item.product.description,
            price: item.line.unit_price,
            count: item.line.quantity.value(),
            total: item.line.line_total(),
            free_delivery: item.product.free_delivery,
            rating: item.product.rating,
        }
    }
}

async fn basket(s: &AppState, cart: &Cart) -> Result<Json<Vec<BasketItem>>> {
    let items = s.carts.items(cart).await?;
    Ok(Json(items.into_iter().map(BasketItem::from).collect()))
}

pub async fn get_basket(State(s): State<AppState>, session: Session) -> Result<Json<Vec<BasketItem>>> {
    let cart = s.carts.cart(&session).await?;
    basket(&s, &cart).await
}

pub async fn add_to_basket(
    State(s): State<AppState>,
    session: Session,
    AppJson(r): AppJson<AddToBasket>,
) -> Result<Json<Vec<BasketItem>>> {
    let cart = s.carts.add(&session, r.id, Quantity::new(r.count)?).await?;
    basket(&s, &cart).await
}

pub async fn remove_from_basket(
    State(s): State<AppState>,
    session: Session,
    AppJson(r): AppJson<RemoveFromBasket>,
) -> Result<Json<Vec<BasketItem>>> {
    let cart = s.carts.remove(&session, r.id, r.count.unwrap_or(0)).await?;
    basket(&s, &cart).await
}
