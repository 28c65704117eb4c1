use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartLine, ProductId, ResolvedCartLine},
    traits::MarketError,
};

/// Adds `quantity` to the buyer's line for the product, creating the line if necessary. The insert and the increment
/// are one statement, so two concurrent adds for the same product both land on a single line.
pub async fn upsert_line(
    buyer_id: &str,
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<CartLine, MarketError> {
    let line: CartLine = sqlx::query_as(
        r#"
            INSERT INTO cart_lines (buyer_id, product_id, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (buyer_id, product_id) DO UPDATE
                SET quantity = cart_lines.quantity + excluded.quantity, updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(buyer_id)
    .bind(product_id.as_str())
    .bind(quantity)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_foreign_key_violation() => MarketError::ProductNotFound(product_id.clone()),
        e => e.into(),
    })?;
    debug!("🛒️ Cart line {} for {buyer_id} now holds {} x {product_id}", line.id, line.quantity);
    Ok(line)
}

pub async fn set_quantity(
    buyer_id: &str,
    line_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartLine>, sqlx::Error> {
    sqlx::query_as("UPDATE cart_lines SET quantity = $1, updated_at = $2 WHERE id = $3 AND buyer_id = $4 RETURNING *")
        .bind(quantity)
        .bind(Utc::now())
        .bind(line_id)
        .bind(buyer_id)
        .fetch_optional(conn)
        .await
}

pub async fn remove_line(buyer_id: &str, line_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND buyer_id = $2")
        .bind(line_id)
        .bind(buyer_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// The buyer's cart joined with the catalog. Prices and stock are read now, not when the line was added.
pub async fn fetch_snapshot(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<ResolvedCartLine>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                c.id AS line_id,
                c.product_id,
                p.name AS product_name,
                p.farmer_id,
                c.quantity,
                p.price AS unit_price,
                p.stock AS available_stock
            FROM cart_lines c
            JOIN products p ON p.id = c.product_id
            WHERE c.buyer_id = $1
            ORDER BY c.created_at ASC, c.id ASC;
        "#,
    )
    .bind(buyer_id)
    .fetch_all(conn)
    .await
}

pub async fn clear(buyer_id: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_lines WHERE buyer_id = $1").bind(buyer_id).execute(conn).await?;
    Ok(result.rows_affected())
}
