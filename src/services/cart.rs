//! Cart engine over the catalog and the visitor's session.

use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tower_sessions::{session::Id, Session};
use tracing::instrument;

use super::{Clock, EventPublisher, KeyedLocks};
use crate::domain::aggregates::{AddOutcome, Cart, CartLine, Product, RemoveOutcome, StockPolicy, StockedProduct};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{OrderId, ProductId, Quantity};
use crate::error::{AppError, Result};
use crate::store::CatalogStore;

/// Session key holding the serialized cart.
pub const CART_SESSION_KEY: &str = "cart";

/// A cart line joined with its catalog row.
#[derive(Clone, Debug, PartialEq)]
pub struct CartItem {
    pub product: Product,
    pub line: CartLine,
}

pub struct CartService {
    catalog: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    events: EventPublisher,
    policy: StockPolicy,
    locks: KeyedLocks<Id>,
}

impl CartService {
    pub fn new(catalog: Arc<dyn CatalogStore>, clock: Arc<dyn Clock>, events: EventPublisher, policy: StockPolicy) -> Self {
        Self { catalog, clock, events, policy, locks: KeyedLocks::new() }
    }

    pub fn policy(&self) -> StockPolicy { self.policy }

    /// Serializes read-modify-write cycles on one stored session. A session
    /// without an id has never been saved, so no other request can share it.
    async fn exclusive(&self, session: &Session) -> Option<OwnedMutexGuard<()>> {
        match session.id() {
            Some(id) => Some(self.locks.lock(&id).await),
            None => None,
        }
    }

    /// Writes the cart and flushes the session to its store before the lock is released.
    async fn commit(&self, session: &Session, cart: &Cart) -> Result<()> {
        session.insert(CART_SESSION_KEY, cart).await?;
        session.save().await?;
        Ok(())
    }

    async fn product(&self, id: ProductId) -> Result<Product> {
        self.catalog.product(id).await?.ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    pub async fn cart(&self, session: &Session) -> Result<Cart> {
        Ok(session.get::<Cart>(CART_SESSION_KEY).await?.unwrap_or_default())
    }

    /// Cart lines joined with the current catalog rows, in product id order.
    pub async fn items(&self, cart: &Cart) -> Result<Vec<CartItem>> {
        let products = self.catalog.products(&cart.product_ids()).await?;
        Ok(products
            .into_iter()
            .filter_map(|product| cart.line(product.id).cloned().map(|line| CartItem { product, line }))
            .collect())
    }

    #[instrument(skip(self, session), fields(policy = ?self.policy))]
    pub async fn add(&self, session: &Session, product_id: ProductId, quantity: Quantity) -> Result<Cart> {
        let _guard = self.exclusive(session).await;
        let product = self.product(product_id).await?;
        let sale = self.catalog.active_sale(product_id, self.clock.today()).await?;
        let stocked = StockedProduct::new(&product, sale.as_ref());

        let mut cart = self.cart(session).await?;
        match cart.add(&stocked, quantity, self.policy) {
            Ok(AddOutcome::Unchanged) => {
                tracing::warn!(%product_id, stock = stocked.stock, "Add ignored, not enough stock");
            }
            Ok(outcome) => {
                tracing::debug!(?outcome, price = %stocked.effective_price(), "Cart updated");
                self.commit(session, &cart).await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Add rejected");
                return Err(e.into());
            }
        }
        Ok(cart)
    }

    /// `count == 1` removes one unit; anything else drops the line.
    #[instrument(skip(self, session))]
    pub async fn remove(&self, session: &Session, product_id: ProductId, count: u32) -> Result<Cart> {
        let _guard = self.exclusive(session).await;
        self.product(product_id).await?;
        let mut cart = self.cart(session).await?;
        if cart.remove(product_id, count) != RemoveOutcome::Absent {
            self.commit(session, &cart).await?;
        }
        Ok(cart)
    }

    /// Empties the cart once it has become `order_id`.
    #[instrument(skip(self, session))]
    pub async fn clear(&self, session: &Session, order_id: OrderId) -> Result<()> {
        let _guard = self.exclusive(session).await;
        if session.remove_value(CART_SESSION_KEY).await?.is_some() {
            session.save().await?;
            self.events.publish(DomainEvent::Cart(CartEvent::Cleared { order_id })).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Sale;
    use crate::domain::value_objects::Money;
    use crate::services::FixedClock;
    use crate::store::memory::MemoryCatalog;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tower_sessions::MemoryStore;

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        clock: Arc<FixedClock>,
        carts: Arc<CartService>,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn session(&self) -> Session { Session::new(None, self.store.clone(), None) }

        /// Another request carrying the same session cookie.
        fn reopen(&self, session: &Session) -> Session {
            Session::new(session.id(), self.store.clone(), None)
        }
    }

    async fn fixture(policy: StockPolicy) -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.put_product(Product::new(ProductId::new(7), "Kettle", Money::units(100), 5)).await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()));
        let carts = Arc::new(CartService::new(catalog.clone(), clock.clone(), EventPublisher::disabled(), policy));
        Fixture { catalog, clock, carts, store: Arc::new(MemoryStore::default()) }
    }

    fn qty(n: u32) -> Quantity { Quantity::new(n).unwrap() }

    #[tokio::test]
    async fn test_add_beyond_stock() {
        let f = fixture(StockPolicy::Reject).await;
        let session = f.session();
        let id = ProductId::new(7);
        f.carts.add(&session, id, qty(3)).await.unwrap();
        let err = f.carts.add(&session, id, qty(3)).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientStock { in_cart: 3, available: 5, .. }));
        assert_eq!(f.carts.cart(&f.reopen(&session)).await.unwrap().line(id).unwrap().quantity, qty(3));

        let lenient = fixture(StockPolicy::Ignore).await;
        let session = lenient.session();
        lenient.carts.add(&session, id, qty(3)).await.unwrap();
        let cart = lenient.carts.add(&session, id, qty(3)).await.unwrap();
        assert_eq!(cart.line(id).unwrap().quantity, qty(3));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let f = fixture(StockPolicy::Reject).await;
        let session = f.session();
        assert!(matches!(f.carts.add(&session, ProductId::new(99), qty(1)).await, Err(AppError::NotFound(_))));
        assert!(matches!(f.carts.remove(&session, ProductId::new(99), 1).await, Err(AppError::NotFound(_))));
        assert!(session.id().is_none());
    }

    #[tokio::test]
    async fn test_sale_expiry_keeps_snapshot() {
        let f = fixture(StockPolicy::Reject).await;
        let id = ProductId::new(7);
        f.catalog
            .put_sale(Sale {
                product_id: id,
                sale_price: Money::units(60),
                date_from: NaiveDate::from_ymd_opt(2024, 3, 1),
                date_to: NaiveDate::from_ymd_opt(2024, 3, 10),
            })
            .await;
        let session = f.session();
        f.carts.add(&session, id, qty(1)).await.unwrap();
        f.clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());
        let cart = f.carts.add(&session, id, qty(1)).await.unwrap();
        assert_eq!(cart.line(id).unwrap().unit_price, Money::units(60));
        assert_eq!(cart.total_price(), Money::units(120));

        let other = f.session();
        assert_eq!(f.carts.add(&other, id, qty(1)).await.unwrap().total_price(), Money::units(100));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let f = fixture(StockPolicy::Reject).await;
        let session = f.session();
        let id = ProductId::new(7);
        f.carts.add(&session, id, qty(2)).await.unwrap();
        let cart = f.carts.remove(&session, id, 1).await.unwrap();
        assert_eq!(cart.total_count(), 1);
        let items = f.carts.items(&cart).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product.title, "Kettle");
        f.carts.clear(&session, OrderId::new(1)).await.unwrap();
        assert!(f.carts.cart(&session).await.unwrap().is_empty());
        assert!(f.carts.cart(&f.reopen(&session)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_adds_do_not_lose_updates() {
        let f = fixture(StockPolicy::Reject).await;
        f.catalog.set_stock(ProductId::new(7), 100).await;
        let first = f.session();
        f.carts.add(&first, ProductId::new(7), Quantity::ONE).await.unwrap();
        let mut tasks = Vec::new();
        for _ in 0..19 {
            let carts = Arc::clone(&f.carts);
            let session = f.reopen(&first);
            tasks.push(tokio::spawn(async move { carts.add(&session, ProductId::new(7), Quantity::ONE).await }));
        }
        for t in tasks { t.await.unwrap().unwrap(); }
        assert_eq!(f.carts.cart(&f.reopen(&first)).await.unwrap().total_count(), 20);
    }
}
