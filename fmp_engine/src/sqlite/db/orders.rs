use std::collections::HashMap;

use chrono::Utc;
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderItem, OrderStatusType},
    order_objects::OrderQueryFilter,
    traits::{MarketError, StatusChange},
};

/// Inserts a new order and its items using the given connection. This is not atomic. Embed this call inside a
/// transaction, and pass `&mut tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, MarketError> {
    let total = order.total_amount()?;
    let NewOrder { order_id, buyer_id, items, currency, payment_method, delivery_address, notes, created_at } = order;
    let mut result: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                buyer_id,
                total_amount,
                currency,
                payment_method,
                street,
                city,
                state,
                zip_code,
                country,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING *;
        "#,
    )
    .bind(&order_id)
    .bind(buyer_id)
    .bind(total)
    .bind(currency)
    .bind(payment_method)
    .bind(delivery_address.street)
    .bind(delivery_address.city)
    .bind(delivery_address.state)
    .bind(delivery_address.zip_code)
    .bind(delivery_address.country)
    .bind(notes)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_id, position, product_id, product_name, farmer_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7);
            "#,
        )
        .bind(&order_id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(&item.farmer_id)
        .bind(item.quantity)
        .bind(item.unit_price)
        .execute(&mut *conn)
        .await?;
    }
    result.items = items;
    debug!("📦️ Order {order_id} inserted with {} item(s) totalling {total}", result.items.len());
    Ok(result)
}

pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT product_id, product_name, farmer_id, quantity, unit_price
            FROM order_items WHERE order_id = $1 ORDER BY position ASC;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_all(conn)
    .await
}

async fn with_items(order: Option<Order>, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    match order {
        Some(mut order) => {
            order.items = fetch_items(&order.order_id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

pub async fn fetch_order_by_intent(intent_ref: &str, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE payment_intent_ref = $1")
        .bind(intent_ref)
        .fetch_optional(&mut *conn)
        .await?;
    with_items(order, conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in descending order, unless `oldest_first` is set.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(buyer_id) = query.buyer_id {
        where_clause.push("buyer_id = ");
        where_clause.push_bind_unseparated(buyer_id);
    }
    if let Some(farmer_id) = query.farmer_id {
        where_clause.push("order_id IN (SELECT order_id FROM order_items WHERE farmer_id = ");
        where_clause.push_bind_unseparated(farmer_id);
        where_clause.push_unseparated(")");
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, s) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(s);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(statuses) = query.payment_status.filter(|s| !s.is_empty()) {
        where_clause.push("payment_status IN (");
        for (i, s) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(s);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(has_intent) = query.has_payment_intent {
        if has_intent {
            where_clause.push("payment_intent_ref IS NOT NULL");
        } else {
            where_clause.push("payment_intent_ref IS NULL");
        }
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    if let Some((created_at, order_id)) = query.after {
        where_clause.push("(created_at, order_id) > (");
        where_clause.push_bind_unseparated(created_at);
        where_clause.push_unseparated(", ");
        where_clause.push_bind_unseparated(order_id.0);
        where_clause.push_unseparated(")");
    }
    if query.oldest_first {
        builder.push(" ORDER BY created_at ASC, order_id ASC");
    } else {
        builder.push(" ORDER BY created_at DESC, order_id ASC");
    }
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }

    trace!("📦️ Executing query: {}", builder.sql());
    let mut orders: Vec<Order> = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    if orders.is_empty() {
        return Ok(orders);
    }
    let mut items = fetch_items_for_orders(&orders, conn).await?;
    for order in &mut orders {
        order.items = items.remove(&order.order_id).unwrap_or_default();
    }
    trace!("📦️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

async fn fetch_items_for_orders(
    orders: &[Order],
    conn: &mut SqliteConnection,
) -> Result<HashMap<OrderId, Vec<OrderItem>>, sqlx::Error> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT order_id, product_id, product_name, farmer_id, quantity, unit_price FROM order_items WHERE order_id IN (",
    );
    let mut ids = builder.separated(", ");
    for order in orders {
        ids.push_bind(order.order_id.as_str());
    }
    builder.push(") ORDER BY order_id, position ASC");
    let rows: Vec<(OrderId, OrderItem)> = builder
        .build_query_as::<ItemRow>()
        .fetch_all(conn)
        .await?
        .into_iter()
        .map(|r| (r.order_id, r.item))
        .collect();
    let mut result: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for (order_id, item) in rows {
        result.entry(order_id).or_default().push(item);
    }
    Ok(result)
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    order_id: OrderId,
    #[sqlx(flatten)]
    item: OrderItem,
}

/// Applies the status change if the order currently matches the expected state. Returns the updated order row
/// (without items), or `None` if the guard did not match.
pub async fn compare_and_set_status(
    order_id: &OrderId,
    change: &StatusChange,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketError> {
    if change.expected_status.is_empty() {
        return Ok(None);
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE orders SET status = ");
    builder.push_bind(change.new_status);
    if let Some(payment_status) = change.new_payment_status {
        builder.push(", payment_status = ");
        builder.push_bind(payment_status);
    }
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id.as_str());
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for s in &change.expected_status {
        statuses.push_bind(*s);
    }
    builder.push(")");
    if let Some(expected) = change.expected_payment_status {
        builder.push(" AND payment_status = ");
        builder.push_bind(expected);
    }
    builder.push(" RETURNING *");
    trace!("📦️ Executing status update: {}", builder.sql());
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    Ok(order)
}

pub async fn set_payment_intent(
    order_id: &OrderId,
    intent_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, MarketError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET payment_intent_ref = $1, updated_at = $2
            WHERE order_id = $3 AND (payment_intent_ref IS NULL OR payment_intent_ref = $1)
            RETURNING *;
        "#,
    )
    .bind(intent_ref)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => MarketError::IntentInUse(intent_ref.to_string()),
        e => e.into(),
    })?;
    Ok(order)
}

/// Sets the tracking number, but only while the order is in fulfilment. Returns `None` if the order does not exist or
/// is in any other status.
pub async fn set_tracking_number(
    order_id: &OrderId,
    tracking_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    use OrderStatusType::*;
    sqlx::query_as(
        r#"
            UPDATE orders SET tracking_number = $1, updated_at = $2
            WHERE order_id = $3 AND status IN ($4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(tracking_number)
    .bind(Utc::now())
    .bind(order_id.as_str())
    .bind(Preparing)
    .bind(Ready)
    .bind(OutForDelivery)
    .fetch_optional(conn)
    .await
}
