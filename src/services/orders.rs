//! Order assembler: draft creation, checkout, payment and retrieval.

use std::sync::Arc;
use tower_sessions::Session;
use tracing::instrument;

use super::{CartService, Clock, EventPublisher, KeyedLocks, PaymentDecision, PaymentValidator};
use crate::domain::aggregates::{CheckoutDetails, NewOrder, Order, OrderProduct, Product};
use crate::domain::delivery::DeliveryPricing;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CardNumber, Identity, Money, OrderId, ProductId, Quantity, UserId};
use crate::error::{AppError, Result};
use crate::store::{CatalogStore, OrderStore, ProfileStore};

#[derive(Clone, Debug, PartialEq)]
pub struct OrderItem {
    pub product: Product,
    pub count: Quantity,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogStore>,
    profiles: Arc<dyn ProfileStore>,
    carts: Arc<CartService>,
    payments: Arc<dyn PaymentValidator>,
    pricing: DeliveryPricing,
    clock: Arc<dyn Clock>,
    events: EventPublisher,
    locks: KeyedLocks<OrderId>,
}

fn require_user(identity: Identity) -> Result<UserId> {
    identity.user().ok_or(AppError::Unauthenticated)
}

/// Keeps the first entry for each product.
fn dedup_products(products: Vec<OrderProduct>) -> Vec<OrderProduct> {
    let mut out: Vec<OrderProduct> = Vec::with_capacity(products.len());
    for p in products {
        if !out.iter().any(|o| o.product_id == p.product_id) { out.push(p); }
    }
    out
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogStore>,
        profiles: Arc<dyn ProfileStore>,
        carts: Arc<CartService>,
        payments: Arc<dyn PaymentValidator>,
        pricing: DeliveryPricing,
        clock: Arc<dyn Clock>,
        events: EventPublisher,
    ) -> Self {
        Self { orders, catalog, profiles, carts, payments, pricing, clock, events, locks: KeyedLocks::new() }
    }

    async fn ensure_products_exist(&self, products: &[OrderProduct]) -> Result<()> {
        let ids: Vec<ProductId> = products.iter().map(|p| p.product_id).collect();
        let found = self.catalog.products(&ids).await?;
        match ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
            Some(missing) => Err(AppError::NotFound(format!("product {missing}"))),
            None => Ok(()),
        }
    }

    /// Loads an order owned by `user`. Someone else's order is reported as missing.
    async fn owned(&self, user: UserId, id: OrderId) -> Result<Order> {
        match self.orders.get(id).await? {
            Some(order) if order.user_id() == user => Ok(order),
            _ => Err(AppError::NotFound(format!("order {id}"))),
        }
    }

    async fn details(&self, order: Order) -> Result<OrderDetails> {
        let quantities = order.quantities();
        let ids: Vec<ProductId> = quantities.iter().map(|(id, _)| *id).collect();
        let products = self.catalog.products(&ids).await?;
        let mut items = Vec::with_capacity(quantities.len());
        for (id, count) in quantities {
            match products.iter().find(|p| p.id == id) {
                Some(product) => items.push(OrderItem { product: product.clone(), count }),
                None => tracing::warn!(order_id = %order.id(), product_id = %id, "Ordered product missing from catalog"),
            }
        }
        Ok(OrderDetails { order, items })
    }

    /// Creates a draft priced at `cart_total`.
    #[instrument(skip(self, products), fields(products = products.len()))]
    pub async fn create_draft(&self, identity: Identity, cart_total: Money, products: Vec<OrderProduct>) -> Result<OrderId> {
        let user = require_user(identity)?;
        let products = dedup_products(products);
        if products.is_empty() {
            return Err(AppError::ValidationFailed("order has no products".into()));
        }
        self.ensure_products_exist(&products).await?;
        let contact = self.profiles.get(user).await?;

        let order = self
            .orders
            .create_draft(NewOrder { user_id: user, total_cost: cart_total, products, created_at: self.clock.now(), contact })
            .await?;
        tracing::info!(order_id = %order.id(), total = %order.total_cost(), "Draft order created");
        self.events
            .publish(DomainEvent::Order(OrderEvent::Drafted { order_id: order.id(), user_id: user, total_cost: order.total_cost() }))
            .await;
        Ok(order.id())
    }

    /// Draft from the session's cart. An empty `products` list takes the cart lines.
    pub async fn create_draft_from_cart(&self, identity: Identity, session: &Session, products: Vec<OrderProduct>) -> Result<OrderId> {
        require_user(identity)?;
        let cart = self.carts.cart(session).await?;
        let products = if products.is_empty() {
            cart.lines().map(|(product_id, line)| OrderProduct { product_id, count: line.quantity }).collect()
        } else {
            products
        };
        self.create_draft(identity, cart.total_price(), products).await
    }

    /// Applies checkout details and writes the order with its line items in
    /// one store call, then empties the caller's cart.
    #[instrument(skip(self, details, session), fields(delivery = %details.delivery_type))]
    pub async fn finalize(&self, identity: Identity, id: OrderId, details: CheckoutDetails, session: &Session) -> Result<Order> {
        let user = require_user(identity)?;
        let _guard = self.locks.lock(&id).await;
        let mut order = self.owned(user, id).await?;
        self.ensure_products_exist(&details.products).await?;

        let before = order.total_cost();
        let lines = order.finalize(details, &self.pricing)?;
        let inserted = self.orders.finalize(&order, &lines).await?;
        if inserted < lines.len() {
            tracing::debug!(order_id = %id, inserted, "Some order lines were already present");
        }
        order.lines = lines;
        tracing::info!(order_id = %id, %before, total = %order.total_cost(), "Order awaiting payment");

        // The order is committed at this point; a stale cart is only an inconvenience.
        if let Err(e) = self.carts.clear(session, id).await {
            tracing::warn!(order_id = %id, error = %e, "Failed to clear cart after checkout");
        }
        self.events.publish(DomainEvent::Order(OrderEvent::Finalized { order_id: id, total_cost: order.total_cost() })).await;
        Ok(order)
    }

    /// Runs the card through the payment validator. A declined card is
    /// recorded on the order before `PaymentRejected` is returned.
    #[instrument(skip(self))]
    pub async fn pay(&self, identity: Identity, id: OrderId, card: &CardNumber) -> Result<Order> {
        let user = require_user(identity)?;
        let _guard = self.locks.lock(&id).await;
        let mut order = self.owned(user, id).await?;

        let decision = self.payments.validate(card).await;
        order.record_payment(decision == PaymentDecision::Approved)?;
        self.orders.save(&order).await?;

        match decision {
            PaymentDecision::Approved => {
                tracing::info!(order_id = %id, "Order paid");
                self.events.publish(DomainEvent::Order(OrderEvent::Paid { order_id: id })).await;
                Ok(order)
            }
            PaymentDecision::Declined { reason } => {
                tracing::warn!(order_id = %id, %reason, "Payment declined");
                self.events.publish(DomainEvent::Order(OrderEvent::PaymentFailed { order_id: id })).await;
                Err(AppError::PaymentRejected(id))
            }
        }
    }

    pub async fn get_order(&self, identity: Identity, id: OrderId) -> Result<OrderDetails> {
        let user = require_user(identity)?;
        let order = self.owned(user, id).await?;
        self.details(order).await
    }

    pub async fn list_orders(&self, identity: Identity) -> Result<Vec<OrderDetails>> {
        let user = require_user(identity)?;
        let orders = self.orders.list_for_user(user).await?;
        let mut out = Vec::with_capacity(orders.len());
        for order in orders { out.push(self.details(order).await?); }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderLine, OrderStatus, Profile, StockPolicy};
    use crate::domain::delivery::DeliveryType;
    use crate::services::ParityCardValidator;
    use crate::services::SystemClock;
    use crate::store::memory::{MemoryCatalog, MemoryOrders, MemoryProfiles};
    use crate::store::{StoreError, StoreResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower_sessions::MemoryStore;

    /// Order store whose checkout write can be made to fail.
    #[derive(Default)]
    struct FlakyOrders {
        inner: MemoryOrders,
        fail_finalize: AtomicBool,
    }

    #[async_trait]
    impl OrderStore for FlakyOrders {
        async fn create_draft(&self, order: NewOrder) -> StoreResult<Order> { self.inner.create_draft(order).await }
        async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> { self.inner.get(id).await }
        async fn save(&self, order: &Order) -> StoreResult<()> { self.inner.save(order).await }

        async fn finalize(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<usize> {
            if self.fail_finalize.load(Ordering::SeqCst) {
                return Err(StoreError::Corrupt("connection reset".into()));
            }
            self.inner.finalize(order, lines).await
        }

        async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Order>> { self.inner.list_for_user(user).await }
    }

    struct Fixture {
        carts: Arc<CartService>,
        orders: Arc<OrderService>,
        store: Arc<FlakyOrders>,
        profiles: Arc<MemoryProfiles>,
        sessions: Arc<MemoryStore>,
    }

    impl Fixture {
        fn session(&self) -> Session { Session::new(None, self.sessions.clone(), None) }
    }

    const ALICE: Identity = Identity::User(UserId::new(1));
    const BOB: Identity = Identity::User(UserId::new(2));

    async fn fixture() -> Fixture {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.put_product(Product::new(ProductId::new(1), "Chair", Money::units(900), 10)).await;
        catalog.put_product(Product::new(ProductId::new(2), "Table", Money::units(2500), 3)).await;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let carts = Arc::new(CartService::new(catalog.clone(), clock.clone(), EventPublisher::disabled(), StockPolicy::Reject));
        let profiles = Arc::new(MemoryProfiles::new());
        let store = Arc::new(FlakyOrders::default());
        let orders = Arc::new(OrderService::new(
            store.clone(),
            catalog,
            profiles.clone(),
            carts.clone(),
            Arc::new(ParityCardValidator),
            DeliveryPricing::default(),
            clock,
            EventPublisher::disabled(),
        ));
        Fixture { carts, orders, store, profiles, sessions: Arc::new(MemoryStore::default()) }
    }

    fn item(id: i64, count: u32) -> OrderProduct {
        OrderProduct { product_id: ProductId::new(id), count: Quantity::new(count).unwrap() }
    }

    fn checkout(delivery: &str, products: Vec<OrderProduct>) -> CheckoutDetails {
        CheckoutDetails {
            full_name: "Alice Doe".into(), email: "alice@example.com".into(), phone: "+7000".into(),
            delivery_type: DeliveryType::new(delivery), payment_type: "online".into(),
            city: "Kazan".into(), address: "Main st 5".into(), products,
        }
    }

    #[tokio::test]
    async fn test_anonymous_cannot_order() {
        let f = fixture().await;
        let err = f.orders.create_draft(Identity::Anonymous, Money::units(10), vec![item(1, 1)]).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_full_checkout_flow() {
        let f = fixture().await;
        f.profiles
            .upsert(&Profile { user_id: UserId::new(1), full_name: "Alice".into(), email: "a@x.io".into(), phone: "1".into() })
            .await
            .unwrap();
        let session = f.session();
        f.carts.add(&session, ProductId::new(1), Quantity::new(2).unwrap()).await.unwrap();

        let id = f.orders.create_draft_from_cart(ALICE, &session, vec![]).await.unwrap();
        let draft = f.orders.get_order(ALICE, id).await.unwrap();
        assert_eq!(draft.order.status(), OrderStatus::Draft);
        assert_eq!(draft.order.total_cost(), Money::units(1800));
        assert_eq!(draft.order.full_name(), "Alice");
        assert_eq!(draft.items[0].count, Quantity::new(2).unwrap());

        let order = f.orders.finalize(ALICE, id, checkout("ordinary", vec![item(1, 2)]), &session).await.unwrap();
        assert_eq!(order.total_cost(), Money::units(2000));
        assert_eq!(order.status(), OrderStatus::AwaitingPayment);
        assert!(f.carts.cart(&session).await.unwrap().is_empty());

        let again = f.orders.finalize(ALICE, id, checkout("express", vec![item(1, 2)]), &f.session()).await.unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));

        let declined = f.orders.pay(ALICE, id, &CardNumber::new("4240").unwrap()).await.unwrap_err();
        assert!(matches!(declined, AppError::PaymentRejected(_)));
        assert_eq!(f.orders.get_order(ALICE, id).await.unwrap().order.status(), OrderStatus::PaymentFailed);

        let paid = f.orders.pay(ALICE, id, &CardNumber::new("4242").unwrap()).await.unwrap();
        assert_eq!(paid.status(), OrderStatus::Paid);
        let stored = f.orders.get_order(ALICE, id).await.unwrap();
        assert_eq!(stored.order.total_cost(), Money::units(2000));
        assert!(stored.order.has_line_items());
        assert_eq!(stored.order.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_express_and_free_delivery() {
        let f = fixture().await;
        let express = f.orders.create_draft(ALICE, Money::units(1000), vec![item(1, 1)]).await.unwrap();
        let order = f.orders.finalize(ALICE, express, checkout("express", vec![item(1, 1)]), &f.session()).await.unwrap();
        assert_eq!(order.total_cost(), Money::units(1500));

        let big = f.orders.create_draft(ALICE, Money::units(2500), vec![item(2, 1)]).await.unwrap();
        let order = f.orders.finalize(ALICE, big, checkout("ordinary", vec![item(2, 1)]), &f.session()).await.unwrap();
        assert_eq!(order.total_cost(), Money::units(2500));
    }

    #[tokio::test]
    async fn test_failed_checkout_write_leaves_draft_untouched() {
        let f = fixture().await;
        let session = f.session();
        f.carts.add(&session, ProductId::new(1), Quantity::ONE).await.unwrap();
        let id = f.orders.create_draft_from_cart(ALICE, &session, vec![]).await.unwrap();

        f.store.fail_finalize.store(true, Ordering::SeqCst);
        let err = f.orders.finalize(ALICE, id, checkout("express", vec![item(1, 1)]), &session).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let stored = f.orders.get_order(ALICE, id).await.unwrap().order;
        assert_eq!(stored.status(), OrderStatus::Draft);
        assert_eq!(stored.total_cost(), Money::units(900));
        assert!(!stored.has_line_items());
        assert!(stored.lines().is_empty());
        assert_eq!(f.carts.cart(&session).await.unwrap().total_count(), 1);

        f.store.fail_finalize.store(false, Ordering::SeqCst);
        let order = f.orders.finalize(ALICE, id, checkout("express", vec![item(1, 1)]), &session).await.unwrap();
        assert_eq!(order.total_cost(), Money::units(1400));
        assert_eq!(f.orders.get_order(ALICE, id).await.unwrap().order.lines().len(), 1);
        assert!(f.carts.cart(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_finalize_applies_surcharge_once() {
        let f = fixture().await;
        let id = f.orders.create_draft(ALICE, Money::units(900), vec![item(1, 1)]).await.unwrap();
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let orders = Arc::clone(&f.orders);
            let session = f.session();
            tasks.push(tokio::spawn(async move {
                orders.finalize(ALICE, id, checkout("ordinary", vec![item(1, 1)]), &session).await
            }));
        }
        let mut finalized = 0;
        for t in tasks {
            match t.await.unwrap() {
                Ok(_) => finalized += 1,
                Err(e) => assert!(matches!(e, AppError::Conflict(_)), "unexpected error: {e}"),
            }
        }
        assert_eq!(finalized, 1);
        let stored = f.orders.get_order(ALICE, id).await.unwrap().order;
        assert_eq!(stored.status(), OrderStatus::AwaitingPayment);
        assert_eq!(stored.total_cost(), Money::units(1100));
        assert_eq!(stored.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_pay_racing_finalize_stays_consistent() {
        let f = fixture().await;
        let id = f.orders.create_draft(ALICE, Money::units(900), vec![item(1, 1)]).await.unwrap();
        let (finalize, pay) = {
            let orders = Arc::clone(&f.orders);
            let session = f.session();
            let finalize = tokio::spawn(async move {
                orders.finalize(ALICE, id, checkout("ordinary", vec![item(1, 1)]), &session).await
            });
            let orders = Arc::clone(&f.orders);
            let pay = tokio::spawn(async move { orders.pay(ALICE, id, &CardNumber::new("4242").unwrap()).await });
            (finalize.await.unwrap(), pay.await.unwrap())
        };
        assert!(finalize.is_ok());

        let stored = f.orders.get_order(ALICE, id).await.unwrap().order;
        assert_eq!(stored.total_cost(), Money::units(1100));
        assert!(stored.has_line_items());
        match pay {
            Ok(order) => {
                assert_eq!(order.status(), OrderStatus::Paid);
                assert_eq!(stored.status(), OrderStatus::Paid);
            }
            Err(e) => {
                assert!(matches!(e, AppError::Conflict(_)), "unexpected error: {e}");
                assert_eq!(stored.status(), OrderStatus::AwaitingPayment);
            }
        }
    }

    #[tokio::test]
    async fn test_orders_are_private() {
        let f = fixture().await;
        let id = f.orders.create_draft(ALICE, Money::units(900), vec![item(1, 1)]).await.unwrap();
        assert!(matches!(f.orders.get_order(BOB, id).await, Err(AppError::NotFound(_))));
        assert!(matches!(f.orders.pay(BOB, id, &CardNumber::new("2").unwrap()).await, Err(AppError::NotFound(_))));
        assert_eq!(f.orders.list_orders(ALICE).await.unwrap().len(), 1);
        assert!(f.orders.list_orders(BOB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_products_are_rejected() {
        let f = fixture().await;
        let err = f.orders.create_draft(ALICE, Money::units(1), vec![item(42, 1)]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = f.orders.create_draft(ALICE, Money::units(1), vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }
}
