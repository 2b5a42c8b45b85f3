//! Configuration loaded from environment variables (after `.env`).
//!
//! - `HOST` (default `0.0.0.0`), `PORT` (default `8083`)
//! - `DATABASE_URL` - PostgreSQL; when unset the service runs on in-memory stores
//! - `NATS_URL` - event bus; when unset events are dropped
//! - `SESSION_TTL_SECS` (default two weeks), `SESSION_SECURE` (`true` for HTTPS-only cookies)
//! - `CATALOG_FIXTURE` - JSON file seeding the in-memory catalog
//! - `STOCK_POLICY` - `reject` (default) or `ignore`
//! - `DELIVERY_EXPRESS_FEE`, `DELIVERY_STANDARD_FEE`, `DELIVERY_FREE_THRESHOLD`

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::aggregates::StockPolicy;
use crate::domain::delivery::DeliveryPricing;
use crate::domain::value_objects::Money;

const DEFAULT_PORT: u16 = 8083;
const DEFAULT_SESSION_TTL_SECS: u64 = 14 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub catalog_fixture: Option<PathBuf>,
    pub stock_policy: StockPolicy,
    pub delivery: DeliveryPricing,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            database_url: None,
            nats_url: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            secure_cookies: false,
            catalog_fixture: None,
            stock_policy: StockPolicy::Reject,
            delivery: DeliveryPricing::default(),
        }
    }
}

fn parse<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let stock_policy = match lookup("STOCK_POLICY").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("reject") => StockPolicy::Reject,
            Some("ignore") => StockPolicy::Ignore,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar("STOCK_POLICY".into(), format!("expected reject or ignore, got {other}")))
            }
        };
        let delivery = DeliveryPricing {
            express_fee: parse::<Money>("DELIVERY_EXPRESS_FEE", lookup("DELIVERY_EXPRESS_FEE"), defaults.delivery.express_fee)?,
            standard_fee: parse::<Money>("DELIVERY_STANDARD_FEE", lookup("DELIVERY_STANDARD_FEE"), defaults.delivery.standard_fee)?,
            free_threshold: parse::<Money>("DELIVERY_FREE_THRESHOLD", lookup("DELIVERY_FREE_THRESHOLD"), defaults.delivery.free_threshold)?,
        };

        Ok(Self {
            host: parse("HOST", lookup("HOST"), defaults.host)?,
            port: parse("PORT", lookup("PORT"), defaults.port)?,
            database_url: lookup("DATABASE_URL"),
            nats_url: lookup("NATS_URL"),
            session_ttl: Duration::from_secs(parse("SESSION_TTL_SECS", lookup("SESSION_TTL_SECS"), DEFAULT_SESSION_TTL_SECS)?),
            secure_cookies: parse("SESSION_SECURE", lookup("SESSION_SECURE"), defaults.secure_cookies)?,
            catalog_fixture: lookup("CATALOG_FIXTURE").map(PathBuf::from),
            stock_policy,
            delivery,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}
