//! In-process stores backed by `tokio::sync::RwLock` maps.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{btree_map::Entry, BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use super::{CatalogStore, OrderStore, ProfileStore, StoreError, StoreResult};
use crate::domain::aggregates::{average_rating, NewOrder, Order, OrderLine, Product, Profile, Review, Sale};
use crate::domain::value_objects::{OrderId, ProductId, UserId};

/// Seed file layout for [`MemoryCatalog::load_fixture`].
#[derive(Debug, Default, Deserialize)]
pub struct CatalogFixture {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub sales: Vec<Sale>,
}

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: RwLock<BTreeMap<ProductId, Product>>,
    sales: RwLock<Vec<Sale>>,
    reviews: RwLock<Vec<Review>>,
}

impl MemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub async fn put_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn set_stock(&self, id: ProductId, count: i32) {
        if let Some(p) = self.products.write().await.get_mut(&id) { p.count = count; }
    }

    pub async fn put_sale(&self, sale: Sale) { self.sales.write().await.push(sale); }

    pub async fn clear_sales(&self, id: ProductId) {
        self.sales.write().await.retain(|s| s.product_id != id);
    }

    pub async fn is_empty(&self) -> bool { self.products.read().await.is_empty() }

    /// Loads products and sales from a JSON file; returns the product count.
    pub async fn load_fixture(&self, path: &Path) -> StoreResult<usize> {
        let raw = tokio::fs::read_to_string(path).await?;
        let fixture: CatalogFixture = serde_json::from_str(&raw)?;
        let loaded = fixture.products.len();
        for p in fixture.products { self.put_product(p).await; }
        for s in fixture.sales {
            if !self.products.read().await.contains_key(&s.product_id) {
                return Err(StoreError::Corrupt(format!("sale references unknown product {}", s.product_id)));
            }
            self.put_sale(s).await;
        }
        Ok(loaded)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let products = self.products.read().await;
        Ok(products.values().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn active_sale(&self, id: ProductId, on: NaiveDate) -> StoreResult<Option<Sale>> {
        let sales = self.sales.read().await;
        Ok(sales.iter().find(|s| s.product_id == id && s.is_active_on(on)).cloned())
    }

    async fn active_sales(&self, on: NaiveDate) -> StoreResult<Vec<Sale>> {
        let mut active: Vec<Sale> = self.sales.read().await.iter().filter(|s| s.is_active_on(on)).cloned().collect();
        // stable, so equal start dates keep insertion order
        active.sort_by_key(|s| s.date_from);
        Ok(active)
    }

    async fn add_review(&self, review: &Review) -> StoreResult<Vec<Review>> {
        let mut products = self.products.write().await;
        let Some(product) = products.get_mut(&review.product_id) else {
            return Err(StoreError::Corrupt(format!("review for unknown product {}", review.product_id)));
        };
        let mut reviews = self.reviews.write().await;
        reviews.push(review.clone());
        let own: Vec<Review> = reviews.iter().filter(|r| r.product_id == review.product_id).cloned().collect();
        if let Some(rating) = average_rating(own.iter().map(|r| r.rate)) {
            product.rating = rating;
        }
        Ok(own)
    }
}

#[derive(Debug)]
pub struct MemoryOrders {
    next_id: AtomicI64,
    orders: RwLock<BTreeMap<OrderId, Order>>,
    lines: RwLock<BTreeMap<(OrderId, ProductId), OrderLine>>,
}

impl Default for MemoryOrders {
    fn default() -> Self {
        Self { next_id: AtomicI64::new(1), orders: RwLock::default(), lines: RwLock::default() }
    }
}

impl MemoryOrders {
    pub fn new() -> Self { Self::default() }

    async fn with_lines(&self, mut order: Order) -> Order {
        let lines = self.lines.read().await;
        order.lines = lines.values().filter(|l| l.order_id == order.id).copied().collect();
        order
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn create_draft(&self, order: NewOrder) -> StoreResult<Order> {
        let id = OrderId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let order = order.into_order(id);
        self.orders.write().await.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let order = self.orders.read().await.get(&id).cloned();
        match order {
            Some(o) => Ok(Some(self.with_lines(o).await)),
            None => Ok(None),
        }
    }

    async fn save(&self, order: &Order) -> StoreResult<()> {
        let mut row = order.clone();
        row.lines.clear();
        self.orders.write().await.insert(order.id, row);
        Ok(())
    }

    async fn finalize(&self, order: &Order, new_lines: &[OrderLine]) -> StoreResult<usize> {
        let mut orders = self.orders.write().await;
        let mut lines = self.lines.write().await;
        let mut row = order.clone();
        row.lines.clear();
        orders.insert(order.id, row);
        let mut inserted = 0;
        for line in new_lines {
            if let Entry::Vacant(slot) = lines.entry((line.order_id, line.product_id)) {
                slot.insert(*line);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Order>> {
        let rows: Vec<Order> = self.orders.read().await.values().filter(|o| o.user_id == user).cloned().collect();
        let mut out = Vec::with_capacity(rows.len());
        for o in rows { out.push(self.with_lines(o).await); }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<UserId, Profile>>,
}

impl MemoryProfiles {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ProfileStore for MemoryProfiles {
    async fn get(&self, user: UserId) -> StoreResult<Option<Profile>> {
        Ok(self.profiles.read().await.get(&user).cloned())
    }

    async fn upsert(&self, profile: &Profile) -> StoreResult<()> {
        self.profiles.write().await.insert(profile.user_id, profile.clone());
        Ok(())
    }
}
