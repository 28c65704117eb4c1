//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use fmp_common::Cents;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{cart, new_pool, orders, payments, products, reservations};
use crate::{
    config::EngineConfig,
    db_types::{
        CartLine,
        NewOrder,
        NewProduct,
        Order,
        OrderId,
        OrderStatusType,
        PaymentEvent,
        PaymentEventOutcome,
        PaymentIntentRecord,
        Product,
        ProductId,
        ReservationState,
        ResolvedCartLine,
        StockReservation,
    },
    order_objects::OrderQueryFilter,
    traits::{
        CartManagement,
        CatalogManagement,
        GatewayIntent,
        InventoryManagement,
        MarketError,
        MarketplaceDatabase,
        OrderManagement,
        PaymentRecords,
        StatusChange,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, MarketError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_product(product, &mut conn).await
    }

    async fn fetch_product(&self, product_id: &ProductId) -> Result<Option<Product>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn products_for_farmer(&self, farmer_id: &str) -> Result<Vec<Product>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::products_for_farmer(farmer_id, &mut conn).await?;
        Ok(products)
    }

    async fn delete_product(&self, product_id: &ProductId) -> Result<bool, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let deleted = products::delete_product(product_id, &mut conn).await?;
        if deleted {
            info!("🗃️ Product {product_id} removed from the catalog");
        }
        Ok(deleted)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, MarketError> {
        let mut conn = self.pool.acquire().await?;
        products::adjust_stock(product_id, delta, &mut conn).await
    }

    async fn stock_level(&self, product_id: &ProductId) -> Result<i64, MarketError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_stock(product_id, &mut conn).await?.ok_or_else(|| MarketError::ProductNotFound(product_id.clone()))
    }

    async fn reserve_stock(
        &self,
        checkout_id: &str,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<i64, MarketError> {
        let mut tx = self.pool.begin().await?;
        let stock = reservations::reserve(checkout_id, product_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(stock)
    }

    async fn release_reservations(&self, checkout_id: &str) -> Result<Vec<StockReservation>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let released = reservations::release(checkout_id, ReservationState::Held, &mut tx).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn fetch_reservations(&self, checkout_id: &str) -> Result<Vec<StockReservation>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = reservations::fetch_for_checkout(checkout_id, &mut conn).await?;
        Ok(result)
    }

    async fn release_stale_reservations(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let stale = reservations::stale_checkouts(older_than, &mut conn).await?;
        drop(conn);
        let mut repaired = Vec::with_capacity(stale.len());
        for checkout_id in stale {
            // Each checkout is released in its own transaction. A checkout that commits its order in the meantime
            // has no held reservations left, and is skipped.
            let released = self.release_reservations(&checkout_id).await?;
            if !released.is_empty() {
                repaired.push(checkout_id);
            }
        }
        Ok(repaired)
    }
}

impl CartManagement for SqliteDatabase {
    async fn upsert_cart_line(
        &self,
        buyer_id: &str,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartLine, MarketError> {
        let mut conn = self.pool.acquire().await?;
        cart::upsert_line(buyer_id, product_id, quantity, &mut conn).await
    }

    async fn set_cart_line_quantity(
        &self,
        buyer_id: &str,
        line_id: i64,
        quantity: i64,
    ) -> Result<CartLine, MarketError> {
        let mut conn = self.pool.acquire().await?;
        cart::set_quantity(buyer_id, line_id, quantity, &mut conn).await?.ok_or(MarketError::CartLineNotFound(line_id))
    }

    async fn remove_cart_line(&self, buyer_id: &str, line_id: i64) -> Result<bool, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let removed = cart::remove_line(buyer_id, line_id, &mut conn).await?;
        Ok(removed)
    }

    async fn fetch_cart_snapshot(&self, buyer_id: &str) -> Result<Vec<ResolvedCartLine>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let lines = cart::fetch_snapshot(buyer_id, &mut conn).await?;
        Ok(lines)
    }

    async fn clear_cart(&self, buyer_id: &str) -> Result<u64, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let n = cart::clear(buyer_id, &mut conn).await?;
        Ok(n)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn place_order(&self, order: NewOrder) -> Result<Order, MarketError> {
        let mut tx = self.pool.begin().await?;
        let checkout_id = order.order_id.as_str().to_string();
        let committed = reservations::commit(&checkout_id, &mut tx).await?;
        if !reservations_cover_order(&committed, &order) {
            warn!(
                "🗃️ Checkout {checkout_id} holds {} reservation(s) that do not cover its {} item(s). Rolling back.",
                committed.len(),
                order.items.len()
            );
            // Dropping the transaction rolls back the commit above
            return Err(MarketError::CheckoutExpired(order.order_id));
        }
        for item in &order.items {
            products::increment_units_sold(&item.product_id, item.quantity, &mut tx).await?;
        }
        let buyer_id = order.buyer_id.clone();
        let order = orders::insert_order(order, &mut tx).await?;
        let cleared = cart::clear(&buyer_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Checkout {checkout_id} committed. {cleared} cart line(s) consumed for {buyer_id}");
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_intent(&self, intent_ref: &str) -> Result<Option<Order>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_intent(intent_ref, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::search_orders(query, &mut conn).await?;
        Ok(result)
    }

    async fn compare_and_set_status(
        &self,
        order_id: &OrderId,
        change: StatusChange,
    ) -> Result<Option<Order>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut order) = orders::compare_and_set_status(order_id, &change, &mut tx).await? else {
            return Ok(None);
        };
        if change.new_status == OrderStatusType::Cancelled {
            let released = reservations::release(order_id.as_str(), ReservationState::Committed, &mut tx).await?;
            let units = released.iter().map(|r| r.quantity).sum::<i64>();
            debug!("🗃️ Order {order_id} cancelled. {units} unit(s) returned to stock");
        }
        order.items = orders::fetch_items(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(Some(order))
    }

    async fn bind_payment_intent(&self, order_id: &OrderId, intent_ref: &str) -> Result<Option<Order>, MarketError> {
        let mut tx = self.pool.begin().await?;
        match orders::set_payment_intent(order_id, intent_ref, &mut tx).await? {
            Some(mut order) => {
                order.items = orders::fetch_items(order_id, &mut tx).await?;
                tx.commit().await?;
                Ok(Some(order))
            },
            None => {
                let existing = orders::fetch_order_by_order_id(order_id, &mut tx).await?;
                match existing.and_then(|o| o.payment_intent_ref) {
                    Some(existing) => {
                        Err(MarketError::IntentAlreadyBound { order_id: order_id.clone(), existing })
                    },
                    None => Ok(None),
                }
            },
        }
    }

    async fn set_tracking_number(
        &self,
        order_id: &OrderId,
        tracking_number: &str,
    ) -> Result<Option<Order>, MarketError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_tracking_number(order_id, tracking_number, &mut tx).await?;
        let order = match order {
            Some(mut order) => {
                order.items = orders::fetch_items(order_id, &mut tx).await?;
                Some(order)
            },
            None => None,
        };
        tx.commit().await?;
        Ok(order)
    }
}

impl PaymentRecords for SqliteDatabase {
    async fn upsert_payment_intent(
        &self,
        order_id: &OrderId,
        intent: &GatewayIntent,
    ) -> Result<PaymentIntentRecord, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let record = payments::upsert_intent(order_id, intent, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_payment_intent(&self, intent_ref: &str) -> Result<Option<PaymentIntentRecord>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let record = payments::fetch_intent(intent_ref, &mut conn).await?;
        Ok(record)
    }

    async fn record_payment_event(
        &self,
        intent_ref: &str,
        gateway_status: &str,
        amount: Option<Cents>,
        outcome: PaymentEventOutcome,
    ) -> Result<PaymentEvent, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let event = payments::insert_event(intent_ref, gateway_status, amount, outcome, &mut conn).await?;
        Ok(event)
    }

    async fn payment_events_for_intent(&self, intent_ref: &str) -> Result<Vec<PaymentEvent>, MarketError> {
        let mut conn = self.pool.acquire().await?;
        let events = payments::events_for_intent(intent_ref, &mut conn).await?;
        Ok(events)
    }
}

/// True if the committed reservations hold exactly the quantity of every item in the order, and nothing else.
fn reservations_cover_order(committed: &[StockReservation], order: &NewOrder) -> bool {
    if committed.len() != order.items.len() {
        return false;
    }
    let held = committed.iter().map(|r| (&r.product_id, r.quantity)).collect::<HashMap<_, _>>();
    order.items.iter().all(|item| held.get(&item.product_id) == Some(&item.quantity))
}

impl SqliteDatabase {
    /// Opens the database named in the engine configuration.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, sqlx::Error> {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. This is safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{DeliveryAddress, OrderItem};

    fn reservation(product: &str, quantity: i64) -> StockReservation {
        StockReservation {
            id: 0,
            checkout_id: "c".into(),
            product_id: product.into(),
            quantity,
            state: ReservationState::Committed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(product: &str, quantity: i64) -> OrderItem {
        OrderItem {
            product_id: product.into(),
            product_name: product.into(),
            farmer_id: "f".into(),
            quantity,
            unit_price: Cents::from(100),
        }
    }

    #[test]
    fn coverage_check() {
        let order = NewOrder::new(
            OrderId::from("c"),
            "b",
            vec![item("A", 2), item("B", 1)],
            DeliveryAddress::default(),
            "card",
        );
        assert!(reservations_cover_order(&[reservation("A", 2), reservation("B", 1)], &order));
        assert!(!reservations_cover_order(&[reservation("A", 2)], &order));
        assert!(!reservations_cover_order(&[reservation("A", 1), reservation("B", 1)], &order));
        assert!(!reservations_cover_order(&[reservation("A", 2), reservation("C", 1)], &order));
    }
}
