//! Service-boundary error kinds and their HTTP mapping.
//!
//! Every service returns `Result<T, AppError>`; handlers pass the error
//! through and `IntoResponse` turns each kind into its own status code.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::value_objects::{OrderId, ProductId, ValueError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient stock for product {product_id}: {available} available, {in_cart} already in cart")]
    InsufficientStock { product_id: ProductId, in_cart: u32, available: u32 },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Payment rejected for order {0}")]
    PaymentRejected(OrderId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AppError {
    /// Stable machine-readable kind, used as the `error` field of the body.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthenticated => "unauthenticated",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::ValidationFailed(_) => "validation_failed",
            Self::PaymentRejected(_) => "payment_rejected",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InsufficientStock { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentRejected(_) => StatusCode::PAYMENT_REQUIRED,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::InsufficientStock { product_id, in_cart, available, .. } => Self::InsufficientStock { product_id, in_cart, available },
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NoItems => Self::ValidationFailed(e.to_string()),
            OrderError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
        }
    }
}

impl From<ValueError> for AppError {
    fn from(e: ValueError) -> Self { Self::ValidationFailed(e.to_string()) }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self { Self::Storage(StoreError::Session(e)) }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self { Self::ValidationFailed(e.body_text()) }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self { Self::ValidationFailed(e.body_text()) }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self { Self::ValidationFailed(e.body_text()) }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self { Self::ValidationFailed(e.to_string()) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Storage details stay in the logs
        let message = match &self {
            Self::Storage(e) => {
                tracing::error!(error = %e, "Request failed on storage");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
