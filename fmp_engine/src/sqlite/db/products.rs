use chrono::Utc;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product, ProductId},
    traits::MarketError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, MarketError> {
    let now = Utc::now();
    let id = product.id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO products (id, farmer_id, name, unit, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(product.id)
    .bind(product.farmer_id)
    .bind(product.name)
    .bind(product.unit)
    .bind(product.price)
    .bind(product.stock)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            MarketError::ValidationError(format!("Product {id} already exists"))
        },
        sqlx::Error::Database(err) if err.is_check_violation() => {
            MarketError::ValidationError(format!("Product {id} must have a non-negative price and stock"))
        },
        e => e.into(),
    })?;
    debug!("🗃️ Product {id} added to the catalog");
    Ok(result)
}

pub async fn fetch_product(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id.as_str()).fetch_optional(conn).await
}

pub async fn products_for_farmer(farmer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE farmer_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(farmer_id)
        .fetch_all(conn)
        .await
}

pub async fn delete_product(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(product_id.as_str()).execute(conn).await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_stock(product_id: &ProductId, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let stock: Option<(i64,)> =
        sqlx::query_as("SELECT stock FROM products WHERE id = $1").bind(product_id.as_str()).fetch_optional(conn).await?;
    Ok(stock.map(|(s,)| s))
}

/// Applies `delta` to the stock of the product in a single conditional statement. Nothing is written if the product
/// does not exist or if the result would be negative; in either case `None` is returned.
pub async fn apply_stock_delta(
    product_id: &ProductId,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, sqlx::Error> {
    let stock: Option<(i64,)> = sqlx::query_as(
        r#"
            UPDATE products SET stock = stock + $1, updated_at = $2
            WHERE id = $3 AND stock + $1 >= 0
            RETURNING stock;
        "#,
    )
    .bind(delta)
    .bind(Utc::now())
    .bind(product_id.as_str())
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Stock delta {delta} for {product_id}: {stock:?}");
    Ok(stock.map(|(s,)| s))
}

/// Like [`apply_stock_delta`], but tells the caller why nothing was written.
pub async fn adjust_stock(product_id: &ProductId, delta: i64, conn: &mut SqliteConnection) -> Result<i64, MarketError> {
    match apply_stock_delta(product_id, delta, conn).await? {
        Some(stock) => Ok(stock),
        None => match fetch_stock(product_id, conn).await? {
            None => Err(MarketError::ProductNotFound(product_id.clone())),
            Some(available) => Err(MarketError::InsufficientStock {
                product_id: product_id.clone(),
                requested: delta.saturating_neg(),
                available,
            }),
        },
    }
}

pub async fn increment_units_sold(
    product_id: &ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET units_sold = units_sold + $1, updated_at = $2 WHERE id = $3")
        .bind(quantity)
        .bind(Utc::now())
        .bind(product_id.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
