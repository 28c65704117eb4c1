use chrono::{DateTime, Utc};

use crate::{
    db_types::{ProductId, StockReservation},
    traits::MarketError,
};

/// The inventory ledger. Every method that changes stock does so with a single conditional write, so that concurrent
/// callers can never drive stock below zero.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Atomically applies `delta` to the stock level of the product, provided the result is not negative.
    ///
    /// Returns the new stock level.
    ///
    /// ## Failure modes:
    /// - `ProductNotFound` if the product does not exist.
    /// - `InsufficientStock` if `stock + delta` would be negative. Stock is left unchanged.
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, MarketError>;

    /// Returns the current stock level of the product.
    async fn stock_level(&self, product_id: &ProductId) -> Result<i64, MarketError>;

    /// Takes `quantity` units of the product out of stock on behalf of `checkout_id` and records the hold in the
    /// reservation journal. The decrement and the journal entry are written in the same transaction.
    ///
    /// Returns the new stock level.
    async fn reserve_stock(&self, checkout_id: &str, product_id: &ProductId, quantity: i64)
        -> Result<i64, MarketError>;

    /// Gives back every reservation of `checkout_id` that is still held. Each reservation is flipped to `released`
    /// and restocked in one transaction, so calling this more than once never restocks twice.
    ///
    /// Returns the reservations that were released by this call.
    async fn release_reservations(&self, checkout_id: &str) -> Result<Vec<StockReservation>, MarketError>;

    async fn fetch_reservations(&self, checkout_id: &str) -> Result<Vec<StockReservation>, MarketError>;

    /// Releases held reservations created before `older_than`. These belong to checkouts that crashed or whose
    /// compensation failed.
    ///
    /// Returns the checkout ids that were repaired.
    async fn release_stale_reservations(&self, older_than: DateTime<Utc>) -> Result<Vec<String>, MarketError>;
}
