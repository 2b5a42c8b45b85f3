//! Megano storefront backend
//!
//! Session-scoped shopping cart and a three-step checkout built on it.
//!
//! ## Features
//! - Stock-checked cart kept in the visitor's session
//! - Sale prices captured when an item is added
//! - Draft, finalize and pay flow for orders
//! - Delivery surcharges
//! - Buyer profiles used to prefill orders

pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use http::{router, session_layer};
pub use state::{AppState, Stores};
