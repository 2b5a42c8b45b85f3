//! PostgreSQL stores. Schema lives in `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{postgres::PgArguments, query::Query, PgPool, Postgres};
use std::collections::HashMap;

use super::{CatalogStore, OrderStore, ProfileStore, StoreError, StoreResult};
use crate::domain::aggregates::{average_rating, NewOrder, Order, OrderLine, OrderProduct, OrderStatus, Product, Profile, Review, Sale};
use crate::domain::delivery::DeliveryType;
use crate::domain::value_objects::{Money, OrderId, ProductId, Quantity, UserId};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn attach_counts(&self, mut orders: Vec<Order>) -> StoreResult<Vec<Order>> {
        if orders.is_empty() { return Ok(orders); }
        let ids: Vec<i64> = orders.iter().map(|o| o.id.get()).collect();
        let summary = sqlx::query_as::<_, CountRow>("SELECT order_id, product_id, count FROM order_products WHERE order_id = ANY($1) ORDER BY order_id, product_id")
            .bind(&ids).fetch_all(&self.pool).await?;
        let lines = sqlx::query_as::<_, CountRow>("SELECT order_id, product_id, count FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, product_id")
            .bind(&ids).fetch_all(&self.pool).await?;

        let mut by_order: HashMap<i64, (Vec<OrderProduct>, Vec<OrderLine>)> = HashMap::new();
        for r in summary {
            by_order.entry(r.order_id).or_default().0.push(OrderProduct { product_id: ProductId::new(r.product_id), count: r.quantity()? });
        }
        for r in lines {
            let line = OrderLine { order_id: OrderId::new(r.order_id), product_id: ProductId::new(r.product_id), count: r.quantity()? };
            by_order.entry(r.order_id).or_default().1.push(line);
        }
        for o in &mut orders {
            if let Some((products, lines)) = by_order.remove(&o.id.get()) {
                o.products = products;
                o.lines = lines;
            }
        }
        Ok(orders)
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    title: String,
    description: String,
    full_description: String,
    price: Decimal,
    count: i32,
    free_delivery: bool,
    rating: Decimal,
    limited: bool,
    active: bool,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product {
            id: ProductId::new(r.id), title: r.title, description: r.description, full_description: r.full_description,
            price: Money::new(r.price), count: r.count, free_delivery: r.free_delivery, rating: r.rating,
            limited: r.limited, active: r.active,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SaleRow { product_id: i64, sale_price: Decimal, date_from: Option<NaiveDate>, date_to: Option<NaiveDate> }

impl From<SaleRow> for Sale {
    fn from(r: SaleRow) -> Self {
        Sale { product_id: ProductId::new(r.product_id), sale_price: Money::new(r.sale_price), date_from: r.date_from, date_to: r.date_to }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow { product_id: i64, author: String, email: String, text: String, rate: i16, created_at: DateTime<Utc> }

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;
    fn try_from(r: ReviewRow) -> Result<Self, Self::Error> {
        let rate = u8::try_from(r.rate).map_err(|_| StoreError::Corrupt(format!("review rate {} out of range", r.rate)))?;
        Ok(Review { product_id: ProductId::new(r.product_id), author: r.author, email: r.email, text: r.text, rate, created_at: r.created_at })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    created_at: DateTime<Utc>,
    user_id: i64,
    delivery_type: Option<String>,
    payment_type: String,
    total_cost: Decimal,
    status: String,
    city: String,
    address: String,
    full_name: String,
    email: String,
    phone: String,
    has_line_items: bool,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_label(&r.status)
            .ok_or_else(|| StoreError::Corrupt(format!("order {} has unknown status {:?}", r.id, r.status)))?;
        Ok(Order {
            id: OrderId::new(r.id), created_at: r.created_at, user_id: UserId::new(r.user_id),
            delivery_type: r.delivery_type.map(DeliveryType::new), payment_type: r.payment_type,
            total_cost: Money::new(r.total_cost), status, city: r.city, address: r.address,
            full_name: r.full_name, email: r.email, phone: r.phone,
            products: vec![], lines: vec![], has_line_items: r.has_line_items,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CountRow { order_id: i64, product_id: i64, count: i32 }

impl CountRow {
    fn quantity(&self) -> StoreResult<Quantity> {
        u32::try_from(self.count)
            .ok()
            .and_then(|c| Quantity::new(c).ok())
            .ok_or_else(|| StoreError::Corrupt(format!("order {} has count {} for product {}", self.order_id, self.count, self.product_id)))
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow { user_id: i64, full_name: String, email: String, phone: String }

fn db_count(count: Quantity) -> StoreResult<i32> {
    i32::try_from(count.value()).map_err(|_| StoreError::Corrupt(format!("count {count} does not fit the column")))
}

fn update_order(order: &Order) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        "UPDATE orders SET delivery_type = $2, payment_type = $3, total_cost = $4, status = $5, city = $6, \
         address = $7, full_name = $8, email = $9, phone = $10, has_line_items = $11 WHERE id = $1",
    )
    .bind(order.id.get()).bind(order.delivery_type.as_ref().map(DeliveryType::as_str)).bind(&order.payment_type)
    .bind(order.total_cost.amount()).bind(order.status.label()).bind(&order.city).bind(&order.address)
    .bind(&order.full_name).bind(&order.email).bind(&order.phone).bind(order.has_line_items)
}

const PRODUCT_COLUMNS: &str = "id, title, description, full_description, price, count, free_delivery, rating, limited, active";
const ORDER_COLUMNS: &str = "id, created_at, user_id, delivery_type, payment_type, total_cost, status, city, address, full_name, email, phone, has_line_items";

#[async_trait]
impl CatalogStore for PgStore {
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.get()).fetch_optional(&self.pool).await?;
        Ok(row.map(Product::from))
    }

    async fn products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id"))
            .bind(&ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn active_sale(&self, id: ProductId, on: NaiveDate) -> StoreResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT product_id, sale_price, date_from, date_to FROM sales WHERE product_id = $1 AND date_from <= $2 AND date_to >= $2 ORDER BY id LIMIT 1",
        )
        .bind(id.get()).bind(on).fetch_optional(&self.pool).await?;
        Ok(row.map(Sale::from))
    }

    async fn active_sales(&self, on: NaiveDate) -> StoreResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT product_id, sale_price, date_from, date_to FROM sales WHERE date_from <= $1 AND date_to >= $1 ORDER BY date_from, id",
        )
        .bind(on).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Sale::from).collect())
    }

    async fn add_review(&self, review: &Review) -> StoreResult<Vec<Review>> {
        let mut tx = self.pool.begin().await?;
        // row lock so concurrent reviews recompute from the same set
        let found: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(review.product_id.get()).fetch_optional(&mut *tx).await?;
        if found.is_none() {
            return Err(StoreError::Corrupt(format!("review for unknown product {}", review.product_id)));
        }
        sqlx::query("INSERT INTO reviews (product_id, author, email, text, rate, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
            .bind(review.product_id.get()).bind(&review.author).bind(&review.email).bind(&review.text)
            .bind(i16::from(review.rate)).bind(review.created_at)
            .execute(&mut *tx).await?;
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT product_id, author, email, text, rate, created_at FROM reviews WHERE product_id = $1 ORDER BY id",
        )
        .bind(review.product_id.get()).fetch_all(&mut *tx).await?;
        let reviews = rows.into_iter().map(Review::try_from).collect::<StoreResult<Vec<_>>>()?;
        if let Some(rating) = average_rating(reviews.iter().map(|r| r.rate)) {
            sqlx::query("UPDATE products SET rating = $2 WHERE id = $1")
                .bind(review.product_id.get()).bind(rating).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(reviews)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_draft(&self, order: NewOrder) -> StoreResult<Order> {
        let mut draft = order.into_order(OrderId::new(0));
        let mut tx = self.pool.begin().await?;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders (created_at, user_id, total_cost, status, full_name, email, phone, has_line_items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE) RETURNING id",
        )
        .bind(draft.created_at).bind(draft.user_id.get()).bind(draft.total_cost.amount()).bind(draft.status.label())
        .bind(&draft.full_name).bind(&draft.email).bind(&draft.phone)
        .fetch_one(&mut *tx).await?;
        for p in &draft.products {
            sqlx::query("INSERT INTO order_products (order_id, product_id, count) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
                .bind(id).bind(p.product_id.get()).bind(db_count(p.count)?)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        draft.id = OrderId::new(id);
        Ok(draft)
    }

    async fn get(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get()).fetch_optional(&self.pool).await?;
        let Some(row) = row else { return Ok(None) };
        let mut orders = self.attach_counts(vec![Order::try_from(row)?]).await?;
        Ok(orders.pop())
    }

    async fn save(&self, order: &Order) -> StoreResult<()> {
        update_order(order).execute(&self.pool).await?;
        Ok(())
    }

    async fn finalize(&self, order: &Order, lines: &[OrderLine]) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        update_order(order).execute(&mut *tx).await?;
        let mut inserted = 0;
        for line in lines {
            let result = sqlx::query("INSERT INTO order_lines (order_id, product_id, count) VALUES ($1, $2, $3) ON CONFLICT (order_id, product_id) DO NOTHING")
                .bind(line.order_id.get()).bind(line.product_id.get()).bind(db_count(line.count)?)
                .execute(&mut *tx).await?;
            inserted += usize::try_from(result.rows_affected()).unwrap_or(0);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_for_user(&self, user: UserId) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id"))
            .bind(user.get()).fetch_all(&self.pool).await?;
        let orders = rows.into_iter().map(Order::try_from).collect::<StoreResult<Vec<_>>>()?;
        self.attach_counts(orders).await
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn get(&self, user: UserId) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>("SELECT user_id, full_name, email, phone FROM profiles WHERE user_id = $1")
            .bind(user.get()).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| Profile { user_id: UserId::new(r.user_id), full_name: r.full_name, email: r.email, phone: r.phone }))
    }

    async fn upsert(&self, profile: &Profile) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, full_name, email, phone) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET full_name = EXCLUDED.full_name, email = EXCLUDED.email, phone = EXCLUDED.phone",
        )
        .bind(profile.user_id.get()).bind(&profile.full_name).bind(&profile.email).bind(&profile.phone)
        .execute(&self.pool).await?;
        Ok(())
    }
}
