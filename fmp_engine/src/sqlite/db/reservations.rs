//! The stock reservation journal.
//!
//! A reservation records stock that a checkout has taken out of the ledger. It starts out `held`, and ends either
//! `committed` (the checkout produced an order) or `released` (the stock went back on the shelf). Every state change is
//! a conditional update on the current state, which is what makes releasing idempotent.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{ProductId, ReservationState, StockReservation},
    sqlite::db::products,
    traits::MarketError,
};

/// Decrements stock and records a `held` reservation. This is NOT atomic on its own; run it inside a transaction so
/// that the decrement is undone if the journal entry cannot be written.
pub async fn reserve(
    checkout_id: &str,
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<i64, MarketError> {
    let new_stock = match products::apply_stock_delta(product_id, -quantity, conn).await? {
        Some(stock) => stock,
        None => {
            let err = match products::fetch_stock(product_id, conn).await? {
                None => MarketError::ProductNotFound(product_id.clone()),
                Some(available) => {
                    MarketError::InsufficientStock { product_id: product_id.clone(), requested: quantity, available }
                },
            };
            return Err(err);
        },
    };
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO stock_reservations (checkout_id, product_id, quantity, state, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5);
        "#,
    )
    .bind(checkout_id)
    .bind(product_id.as_str())
    .bind(quantity)
    .bind(ReservationState::Held)
    .bind(now)
    .execute(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketError::DuplicateReservation { checkout_id: checkout_id.to_string(), product_id: product_id.clone() }
        },
        e => e.into(),
    })?;
    trace!("🗃️ Reserved {quantity} x {product_id} for checkout {checkout_id}. {new_stock} left");
    Ok(new_stock)
}

/// Flips every reservation of the checkout that is in state `from` to `to`, returning the rows that changed.
async fn transition(
    checkout_id: &str,
    from: ReservationState,
    to: ReservationState,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockReservation>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE stock_reservations SET state = $1, updated_at = $2
            WHERE checkout_id = $3 AND state = $4
            RETURNING *;
        "#,
    )
    .bind(to)
    .bind(Utc::now())
    .bind(checkout_id)
    .bind(from)
    .fetch_all(conn)
    .await
}

/// Marks the held reservations of a checkout as committed. Run this inside the transaction that creates the order.
pub async fn commit(checkout_id: &str, conn: &mut SqliteConnection) -> Result<Vec<StockReservation>, sqlx::Error> {
    transition(checkout_id, ReservationState::Held, ReservationState::Committed, conn).await
}

/// Releases the reservations of a checkout that are in state `from`, and puts their stock back. Reservations in any
/// other state are left alone, so a second call releases nothing. Run this inside a transaction.
pub async fn release(
    checkout_id: &str,
    from: ReservationState,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockReservation>, sqlx::Error> {
    let released = transition(checkout_id, from, ReservationState::Released, conn).await?;
    for r in &released {
        // A product deleted from the catalog has no shelf to return stock to
        let _ = products::apply_stock_delta(&r.product_id, r.quantity, conn).await?;
    }
    if !released.is_empty() {
        debug!("🗃️ Released {} {from} reservation(s) for checkout {checkout_id}", released.len());
    }
    Ok(released)
}

pub async fn fetch_for_checkout(
    checkout_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockReservation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM stock_reservations WHERE checkout_id = $1 ORDER BY id ASC")
        .bind(checkout_id)
        .fetch_all(conn)
        .await
}

/// Checkout ids that still hold stock and were created before `older_than`.
pub async fn stale_checkouts(older_than: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let ids: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT checkout_id FROM stock_reservations WHERE state = $1 AND created_at < $2 ORDER BY checkout_id",
    )
    .bind(ReservationState::Held)
    .bind(older_than)
    .fetch_all(conn)
    .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}
