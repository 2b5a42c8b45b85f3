//! Request extractors. Every rejection goes through [`AppError`], so clients
//! always get the `{"error", "message"}` body.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};

use crate::domain::value_objects::{Identity, UserId};
use crate::error::AppError;

/// Set by the upstream auth layer for signed-in users.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(Self(Identity::Anonymous));
        };
        let raw = value.to_str().map_err(|_| AppError::ValidationFailed(format!("{USER_HEADER} is not valid text")))?;
        Ok(Self(Identity::User(raw.parse::<UserId>()?)))
    }
}

/// `axum::Json` with the crate's error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Path` with the crate's error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// `axum::extract::Query` with the crate's error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
