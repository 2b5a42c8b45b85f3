//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::services::{CartService, CatalogService, Clock, EventPublisher, OrderService, ParityCardValidator, PaymentValidator, ProfileService, SystemClock};
use crate::store::memory::{MemoryCatalog, MemoryOrders, MemoryProfiles};
use crate::store::postgres::PgStore;
use crate::store::{CatalogStore, OrderStore, ProfileStore};

/// The persistence seams. Session state is held by the session layer.
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn CatalogStore>,
    pub orders: Arc<dyn OrderStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl Stores {
    pub fn memory(catalog: Arc<MemoryCatalog>) -> Self {
        Self {
            catalog,
            orders: Arc::new(MemoryOrders::new()),
            profiles: Arc::new(MemoryProfiles::new()),
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let store = Arc::new(store);
        Self { catalog: store.clone(), orders: store.clone(), profiles: store }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores, events: EventPublisher) -> Self {
        Self::with_parts(config, stores, events, Arc::new(SystemClock), Arc::new(ParityCardValidator))
    }

    pub fn with_parts(
        config: &Config,
        stores: Stores,
        events: EventPublisher,
        clock: Arc<dyn Clock>,
        payments: Arc<dyn PaymentValidator>,
    ) -> Self {
        let carts = Arc::new(CartService::new(
            stores.catalog.clone(),
            clock.clone(),
            events.clone(),
            config.stock_policy,
        ));
        let orders = Arc::new(OrderService::new(
            stores.orders,
            stores.catalog.clone(),
            stores.profiles.clone(),
            carts.clone(),
            payments,
            config.delivery,
            clock.clone(),
            events,
        ));
        Self {
            products: Arc::new(CatalogService::new(stores.catalog, clock.clone())),
            carts,
            orders,
            profiles: Arc::new(ProfileService::new(stores.profiles)),
        }
    }
}
