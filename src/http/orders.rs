//! Order and payment endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;
use validator::Validate;

use super::extract::{AppJson, AppPath, CurrentUser};
use crate::domain::aggregates::{CheckoutDetails, OrderProduct, OrderStatus};
use crate::domain::delivery::DeliveryType;
use crate::domain::value_objects::{CardNumber, Money, OrderId, ProductId, Quantity};
use crate::error::{AppError, Result};
use crate::services::{OrderDetails, OrderItem};
use crate::state::AppState;

const CREATED_AT_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub created_at: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub delivery_type: Option<String>,
    pub payment_type: String,
    pub total_cost: Money,
    pub status: OrderStatus,
    pub city: String,
    pub address: String,
    pub products: Vec<OrderItemView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    pub count: u32,
    pub free_delivery: bool,
}

impl From<OrderItem> for OrderItemView {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.product.id,
            title: item.product.title,
            price: item.product.price,
            count: item.count.value(),
            free_delivery: item.product.free_delivery,
        }
    }
}

impl From<OrderDetails> for OrderView {
    fn from(d: OrderDetails) -> Self {
        let o = d.order;
        Self {
            id: o.id(),
            created_at: o.created_at().format(CREATED_AT_FORMAT).to_string(),
            full_name: o.full_name().to_string(),
            email: o.email().to_string(),
            phone: o.phone().to_string(),
            delivery_type: o.delivery_type().map(|d| d.as_str().to_string()),
            payment_type: o.payment_type().to_string(),
            total_cost: o.total_cost(),
            status: o.status(),
            city: o.city().to_string(),
            address: o.address().to_string(),
            products: d.items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

/// One entry of the draft request; extra fields such as `price` are ignored.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderedProduct { pub id: ProductId, pub count: u32 }

impl OrderedProduct {
    fn into_product(self) -> Result<OrderProduct> {
        Ok(OrderProduct { product_id: self.id, count: Quantity::new(self.count)? })
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 256))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub phone: String,
    #[validate(length(min = 1, max = 150))]
    pub delivery_type: String,
    #[validate(length(min = 1, max = 150))]
    pub payment_type: String,
    #[validate(length(min = 1, max = 255))]
    pub city: String,
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    #[validate(length(min = 1))]
    pub products: Vec<OrderedProduct>,
}

impl CheckoutRequest {
    fn into_details(self) -> Result<CheckoutDetails> {
        let products = self.products.into_iter().map(OrderedProduct::into_product).collect::<Result<Vec<_>>>()?;
        Ok(CheckoutDetails {
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            delivery_type: DeliveryType::new(self.delivery_type),
            payment_type: self.payment_type,
            city: self.city,
            address: self.address,
            products,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest { pub number: CardNumber }

pub async fn list_orders(State(s): State<AppState>, CurrentUser(who): CurrentUser) -> Result<Json<Vec<OrderView>>> {
    let orders = s.orders.list_orders(who).await?;
    Ok(Json(orders.into_iter().map(OrderView::from).collect()))
}

pub async fn create_order(
    State(s): State<AppState>,
    CurrentUser(who): CurrentUser,
    session: Session,
    AppJson(r): AppJson<Vec<OrderedProduct>>,
) -> Result<Json<Value>> {
    let products = r.into_iter().map(OrderedProduct::into_product).collect::<Result<Vec<_>>>()?;
    let id = s.orders.create_draft_from_cart(who, &session, products).await?;
    Ok(Json(json!({ "orderId": id })))
}

pub async fn get_order(State(s): State<AppState>, CurrentUser(who): CurrentUser, AppPath(id): AppPath<OrderId>) -> Result<Json<OrderView>> {
    Ok(Json(s.orders.get_order(who, id).await?.into()))
}

/// Echoes the submitted payload back with 201.
pub async fn submit_order(
    State(s): State<AppState>,
    CurrentUser(who): CurrentUser,
    session: Session,
    AppPath(id): AppPath<OrderId>,
    AppJson(raw): AppJson<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    let request: CheckoutRequest = serde_json::from_value(raw.clone()).map_err(|e| AppError::ValidationFailed(e.to_string()))?;
    request.validate()?;
    s.orders.finalize(who, id, request.into_details()?, &session).await?;
    Ok((StatusCode::CREATED, Json(raw)))
}

pub async fn pay_order(
    State(s): State<AppState>,
    CurrentUser(who): CurrentUser,
    AppPath(id): AppPath<OrderId>,
    AppJson(r): AppJson<PaymentRequest>,
) -> Result<Json<OrderView>> {
    s.orders.pay(who, id, &r.number).await?;
    Ok(Json(s.orders.get_order(who, id).await?.into()))
}
