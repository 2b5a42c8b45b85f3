//! Session middleware configuration.
//!
//! The cart lives in a tower-sessions session identified by a cookie. The
//! store is chosen by the caller: `MemoryStore` without a database,
//! `PostgresStore` otherwise.

use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer, SessionStore};

use crate::config::Config;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "megano_session";

/// Builds the session layer. Sessions expire after `SESSION_TTL_SECS` without activity.
pub fn session_layer<S: SessionStore + Clone>(store: S, config: &Config) -> SessionManagerLayer<S> {
    let ttl = tower_sessions::cookie::time::Duration::seconds(i64::try_from(config.session_ttl.as_secs()).unwrap_or(i64::MAX));
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(ttl))
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
