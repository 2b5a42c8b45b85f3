//! HTTP surface.

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;

pub mod cart;
pub mod catalog;
pub mod extract;
pub mod orders;
pub mod profile;
pub mod session;

pub use session::session_layer;

pub fn router<S: SessionStore + Clone>(state: AppState, sessions: SessionManagerLayer<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "megano-storefront"})) }))
        .route("/api/v1/products/:id", get(catalog::get_product))
        .route("/api/v1/products/:id/reviews", post(catalog::post_review))
        .route("/api/v1/sales", get(catalog::list_sales))
        .route("/api/v1/basket", get(cart::get_basket).post(cart::add_to_basket).delete(cart::remove_from_basket))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order).post(orders::submit_order))
        .route("/api/v1/payment/:id", post(orders::pay_order))
        .route("/api/v1/profile", get(profile::get_profile).post(profile::update_profile))
        .layer(sessions)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
