use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Actor, NewProduct, Product, ProductId, Role},
    traits::{CatalogManagement, InventoryManagement, MarketError},
};

/// `InventoryApi` owns product stock levels. Every change is a single conditional write, so stock never goes negative
/// however many callers race on the same product.
pub struct InventoryApi<B> {
    db: B,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement + CatalogManagement
{
    /// Adds `delta` to the stock of the product. Use a negative delta to take stock out.
    ///
    /// Returns the new stock level.
    pub async fn adjust(&self, product_id: &ProductId, delta: i64) -> Result<i64, MarketError> {
        if delta == 0 {
            return Err(MarketError::ValidationError("Stock adjustment must be non-zero".into()));
        }
        if delta.checked_neg().is_none() {
            return Err(MarketError::ValidationError(format!("Stock adjustment {delta} is out of range")));
        }
        let stock = self.db.adjust_stock(product_id, delta).await?;
        trace!("🧾️ Stock for {product_id} adjusted by {delta} to {stock}");
        Ok(stock)
    }

    /// Takes `quantity` units out of stock.
    pub async fn decrement(&self, product_id: &ProductId, quantity: i64) -> Result<i64, MarketError> {
        validate_quantity(quantity)?;
        self.adjust(product_id, -quantity).await
    }

    /// Puts `quantity` units back into stock.
    pub async fn increment(&self, product_id: &ProductId, quantity: i64) -> Result<i64, MarketError> {
        validate_quantity(quantity)?;
        self.adjust(product_id, quantity).await
    }

    /// A farmer restocking (or correcting) one of their own products. Admins may adjust any product.
    pub async fn restock(&self, actor: &Actor, product_id: &ProductId, delta: i64) -> Result<i64, MarketError> {
        let product = self.product(product_id).await?;
        match actor.role {
            Role::Admin | Role::System => {},
            Role::Farmer if actor.subject_id == product.farmer_id => {},
            _ => {
                return Err(MarketError::PermissionDenied(format!("{actor} may not change stock for {product_id}")));
            },
        }
        let stock = self.adjust(product_id, delta).await?;
        info!("🧾️ {actor} changed stock for {product_id} by {delta}. New level: {stock}");
        Ok(stock)
    }

    pub async fn stock_level(&self, product_id: &ProductId) -> Result<i64, MarketError> {
        self.db.stock_level(product_id).await
    }

    pub async fn product(&self, product_id: &ProductId) -> Result<Product, MarketError> {
        self.db.fetch_product(product_id).await?.ok_or_else(|| MarketError::ProductNotFound(product_id.clone()))
    }

    pub async fn products_for_farmer(&self, farmer_id: &str) -> Result<Vec<Product>, MarketError> {
        self.db.products_for_farmer(farmer_id).await
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, MarketError> {
        if product.price.is_negative() || product.stock < 0 {
            return Err(MarketError::ValidationError(format!(
                "Product {} must have a non-negative price and stock",
                product.id
            )));
        }
        self.db.insert_product(product).await
    }

    /// Returns stock held by checkouts that never finished. Any reservation still held after `timeout` is assumed
    /// abandoned.
    ///
    /// Returns the ids of the checkouts that were repaired.
    pub async fn release_stale_reservations(&self, timeout: Duration) -> Result<Vec<String>, MarketError> {
        let cutoff = Utc::now() - timeout;
        let repaired = self.db.release_stale_reservations(cutoff).await?;
        if repaired.is_empty() {
            trace!("🧾️ No stale reservations older than {cutoff}");
        } else {
            warn!("🧾️ Released stale reservations for {} checkout(s): {}", repaired.len(), repaired.join(", "));
        }
        Ok(repaired)
    }
}

pub(crate) fn validate_quantity(quantity: i64) -> Result<(), MarketError> {
    if quantity <= 0 {
        return Err(MarketError::ValidationError(format!("Quantity must be positive, but was {quantity}")));
    }
    Ok(())
}
